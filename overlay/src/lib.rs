//! Geometry core for overlaying a rendered chessboard onto a background scene.
//!
//! A [`calibration::BackgroundCalibration`] is resolved once from four corner
//! clicks, then shared read-only by the [`composite`] step and the
//! [`coords::SquareMapper`] that labels squares in composite-image pixels.

pub mod calibration;
pub mod composite;
pub mod coords;
pub mod square;

pub use calibration::{BackgroundCalibration, Bounds, CalibrationError, Corner};
pub use composite::{DimensionMismatchError, composite};
pub use coords::{BoardPoint, ImagePoint, NormalizedPoint, SquareMapper};
pub use square::{InvalidSquareError, Square};
