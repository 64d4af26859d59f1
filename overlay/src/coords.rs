//! Square to pixel mapping.
//!
//! Three frames are in play and each has its own type:
//! [`BoardPoint`] is relative to the board raster's top-left corner,
//! [`ImagePoint`] is relative to the composite frame, and
//! [`NormalizedPoint`] is the composite position rescaled to 0..=1000.

use serde::Serialize;

use crate::{
    calibration::{BackgroundCalibration, Bounds},
    square::{FILES, Square},
};

pub const NORMALIZED_SCALE: f64 = 1000.0;

/// Pixel position inside the board raster.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BoardPoint {
    pub x: f64,
    pub y: f64,
}

/// Pixel position inside the composite frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ImagePoint {
    pub x: f64,
    pub y: f64,
}

/// Resolution independent position. `first` comes from `x` scaled by the
/// frame height, `second` from `y` scaled by the frame width.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct NormalizedPoint {
    pub first: u32,
    pub second: u32,
}

impl BoardPoint {
    /// Centre of `square` on a board `side_length` pixels wide, white at the bottom.
    pub fn square_center(square: Square, side_length: f64) -> Self {
        let s = side_length / FILES as f64;
        let f = square.file() as f64;
        let r = square.row_from_top() as f64;
        Self {
            x: s * (2.0 * f + 1.0) / 2.0,
            y: s * (2.0 * r + 1.0) / 2.0,
        }
    }

    pub fn to_image(self, bounds: &Bounds) -> ImagePoint {
        ImagePoint {
            x: self.x + bounds.min_x as f64,
            y: self.y + bounds.min_y as f64,
        }
    }
}

impl ImagePoint {
    /// Rescales to the 0..=1000 range, truncating toward zero.
    pub fn normalize(self, frame_width: u32, frame_height: u32) -> NormalizedPoint {
        NormalizedPoint {
            first: (self.x * NORMALIZED_SCALE / frame_height as f64) as u32,
            second: (self.y * NORMALIZED_SCALE / frame_width as f64) as u32,
        }
    }

    /// Whole-pixel label, truncated toward zero.
    pub fn truncated(self) -> [u32; 2] {
        [self.x as u32, self.y as u32]
    }
}

/// Maps squares into the frame of one calibrated background.
#[derive(Clone, Copy)]
pub struct SquareMapper<'a> {
    calibration: &'a BackgroundCalibration,
}

impl<'a> SquareMapper<'a> {
    pub fn new(calibration: &'a BackgroundCalibration) -> Self {
        Self { calibration }
    }

    /// Centre of `square` on the raster, which is drawn `side_px` wide.
    pub fn board_point(&self, square: Square) -> BoardPoint {
        BoardPoint::square_center(square, self.calibration.side_px() as f64)
    }

    pub fn image_point(&self, square: Square) -> ImagePoint {
        self.board_point(square).to_image(&self.calibration.bounds())
    }

    pub fn normalized(&self, square: Square) -> NormalizedPoint {
        let (w, h) = self.calibration.frame_dimensions();
        self.image_point(square).normalize(w, h)
    }

    /// The integer pair written to a manifest.
    pub fn label(&self, square: Square, normalize: bool) -> [u32; 2] {
        if normalize {
            let n = self.normalized(square);
            [n.first, n.second]
        } else {
            self.image_point(square).truncated()
        }
    }
}
