//! Chessboard-in-a-screenshot dataset generator.
//!
//! Random games are played with `shakmaty`, each position is drawn as SVG,
//! rasterized to the calibrated size, pasted into the background and labelled
//! with the pixel centres of the move's squares.

pub mod board;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod episode;
pub mod fonts;
pub mod io;
pub mod raster;
pub mod record;
pub mod render;
