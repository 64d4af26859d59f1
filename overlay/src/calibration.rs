use std::{fs, io, path::Path};

use image::RgbImage;
use log::debug;
use serde::Serialize;
use thiserror::Error;

use crate::square::FILES;

/// Relative edge-length tolerance used when the caller has no opinion.
pub const DEFAULT_SIDE_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("failed to read calibration points: {0}")]
    Io(#[from] io::Error),
    #[error("calibration points line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("expected 4 calibration points, got {0}")]
    PointCount(usize),
    #[error("corner ({x}, {y}) lies outside the {width}x{height} background")]
    OutOfImage { x: i64, y: i64, width: u32, height: u32 },
    #[error("corner edges are not equal: {edges:?}")]
    UnequalSides { edges: [f64; 4] },
    #[error("corners do not form a quadrilateral: {0}")]
    Malformed(&'static str),
    #[error("bounding box {width}x{height} does not match edge length {side:.3}")]
    NotAxisAligned { width: u32, height: u32, side: f64 },
    #[error("board side of {0} px is too small")]
    Degenerate(u32),
}

/// A clicked corner in background-image pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Corner {
    pub x: i64,
    pub y: i64,
}

impl Corner {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    fn distance(self, other: Corner) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        dx.hypot(dy)
    }
}

/// Half-open pixel rectangle `[min_x, max_x) x [min_y, max_y)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Bounds {
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl Bounds {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x > self.min_x as f64
            && x < self.max_x as f64
            && y > self.min_y as f64
            && y < self.max_y as f64
    }
}

/// Background scene plus the square region a board is drawn into.
///
/// Built once per background and never mutated afterwards, so one instance
/// can back any number of composites, including from several threads.
#[derive(Debug, Clone)]
pub struct BackgroundCalibration {
    image: RgbImage,
    corners: [Corner; 4],
    bounds: Bounds,
    side_length: f64,
}

impl BackgroundCalibration {
    /// Validates `corners` against `image` and derives the overlay region.
    ///
    /// Corners may be given in any consistent winding; edges run between
    /// consecutive points and the last point closes back to the first.
    /// `tolerance` is relative to the longest edge.
    pub fn resolve(
        image: RgbImage,
        corners: [Corner; 4],
        tolerance: f64,
    ) -> Result<Self, CalibrationError> {
        let (width, height) = image.dimensions();
        for c in corners {
            if c.x < 0 || c.y < 0 || c.x > width as i64 || c.y > height as i64 {
                return Err(CalibrationError::OutOfImage {
                    x: c.x,
                    y: c.y,
                    width,
                    height,
                });
            }
        }

        let edges: [f64; 4] = std::array::from_fn(|i| corners[i].distance(corners[(i + 1) % 4]));
        let longest = edges.iter().copied().fold(0.0, f64::max);
        let shortest = edges.iter().copied().fold(f64::INFINITY, f64::min);
        if longest - shortest > tolerance * longest {
            return Err(CalibrationError::UnequalSides { edges });
        }
        let side_length = edges.iter().sum::<f64>() / 4.0;

        // Coordinates were range-checked above, so the casts are lossless.
        let bounds = Bounds {
            min_x: corners.iter().map(|c| c.x).min().unwrap_or(0) as u32,
            max_x: corners.iter().map(|c| c.x).max().unwrap_or(0) as u32,
            min_y: corners.iter().map(|c| c.y).min().unwrap_or(0) as u32,
            max_y: corners.iter().map(|c| c.y).max().unwrap_or(0) as u32,
        };

        let (bw, bh) = (bounds.width(), bounds.height());
        if bw != bh || (bw as f64 - side_length).abs() > tolerance * side_length.max(1.0) {
            return Err(CalibrationError::NotAxisAligned {
                width: bw,
                height: bh,
                side: side_length,
            });
        }
        if bw < FILES as u32 {
            return Err(CalibrationError::Degenerate(bw));
        }

        for i in 0..4 {
            if corners[i + 1..].contains(&corners[i]) {
                return Err(CalibrationError::Malformed("repeated corner"));
            }
        }
        let diagonal = side_length * std::f64::consts::SQRT_2;
        for (a, b) in [(0, 2), (1, 3)] {
            if (corners[a].distance(corners[b]) - diagonal).abs() > tolerance * diagonal {
                return Err(CalibrationError::Malformed("diagonals do not match the edges"));
            }
        }

        debug!(
            "calibration resolved: bounds={:?} side={:.3} background={}x{}",
            bounds, side_length, width, height
        );

        Ok(Self {
            image,
            corners,
            bounds,
            side_length,
        })
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn corners(&self) -> &[Corner; 4] {
        &self.corners
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn side_length(&self) -> f64 {
        self.side_length
    }

    /// Edge of the board raster in whole pixels: the bounding box width.
    pub fn side_px(&self) -> u32 {
        self.bounds.width()
    }

    /// `(width, height)` of every composite produced from this background.
    pub fn frame_dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Parses the `x,y` per line file written by the corner picking tool.
pub fn parse_corners(text: &str) -> Result<[Corner; 4], CalibrationError> {
    let mut points = Vec::with_capacity(4);
    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let parse_err = |reason: &str| CalibrationError::Parse {
            line: i + 1,
            reason: reason.to_string(),
        };
        let (x, y) = line.split_once(',').ok_or_else(|| parse_err("expected `x,y`"))?;
        let x = x.trim().parse::<i64>().map_err(|e| parse_err(&e.to_string()))?;
        let y = y.trim().parse::<i64>().map_err(|e| parse_err(&e.to_string()))?;
        points.push(Corner::new(x, y));
    }

    let count = points.len();
    points
        .try_into()
        .map_err(|_| CalibrationError::PointCount(count))
}

pub fn read_corners(path: impl AsRef<Path>) -> Result<[Corner; 4], CalibrationError> {
    parse_corners(&fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    fn square(x0: i64, y0: i64, side: i64) -> [Corner; 4] {
        [
            Corner::new(x0, y0),
            Corner::new(x0 + side, y0),
            Corner::new(x0 + side, y0 + side),
            Corner::new(x0, y0 + side),
        ]
    }

    fn background() -> RgbImage {
        RgbImage::new(1280, 1024)
    }

    fn resolve(corners: [Corner; 4]) -> Result<BackgroundCalibration, CalibrationError> {
        BackgroundCalibration::resolve(background(), corners, DEFAULT_SIDE_TOLERANCE)
    }

    #[test]
    fn square_corners_give_square_bounds() {
        for (x0, y0, side) in [(200, 190, 800), (0, 0, 64), (17, 33, 513), (480, 224, 800)] {
            let cal = resolve(square(x0, y0, side)).unwrap();
            let b = cal.bounds();
            assert_eq!(b.width(), b.height());
            assert_eq!(b.width() as i64, side);
            assert_relative_eq!(cal.side_length(), side as f64);
            assert_eq!(cal.side_px(), side as u32);
            assert_eq!((b.min_x as i64, b.min_y as i64), (x0, y0));
        }
    }

    #[test]
    fn winding_does_not_matter() {
        let mut corners = square(100, 100, 400);
        corners.reverse();
        let cal = resolve(corners).unwrap();
        assert_eq!(cal.bounds(), Bounds { min_x: 100, max_x: 500, min_y: 100, max_y: 500 });
    }

    #[test]
    fn unequal_edges_fail() {
        let corners = [
            Corner::new(100, 100),
            Corner::new(500, 100),
            Corner::new(500, 450),
            Corner::new(100, 450),
        ];
        let err = resolve(corners).unwrap_err();
        assert!(matches!(err, CalibrationError::UnequalSides { .. }), "{err}");
    }

    #[test]
    fn off_by_one_click_is_rejected() {
        let mut corners = square(100, 100, 400);
        corners[2].y += 1;
        assert!(resolve(corners).is_err());
    }

    #[test]
    fn repeated_corner_is_malformed() {
        let corners = [
            Corner::new(100, 100),
            Corner::new(500, 100),
            Corner::new(500, 500),
            Corner::new(500, 100),
        ];
        let err = resolve(corners).unwrap_err();
        assert!(matches!(err, CalibrationError::Malformed(_)), "{err}");
    }

    #[test]
    fn self_crossing_quad_is_malformed() {
        // Bow tie: equal edges and a square box, but the diagonals are sides.
        let corners = [
            Corner::new(100, 100),
            Corner::new(500, 100),
            Corner::new(100, 500),
            Corner::new(500, 500),
        ];
        let err = BackgroundCalibration::resolve(background(), corners, 0.3).unwrap_err();
        assert!(matches!(err, CalibrationError::Malformed(_)), "{err}");
    }

    #[test]
    fn rotated_square_is_rejected() {
        // A diamond: all edges equal, but the box is wider than an edge.
        let corners = [
            Corner::new(300, 100),
            Corner::new(500, 300),
            Corner::new(300, 500),
            Corner::new(100, 300),
        ];
        let err = resolve(corners).unwrap_err();
        assert!(matches!(err, CalibrationError::NotAxisAligned { .. }), "{err}");
    }

    #[test]
    fn corners_outside_background_fail() {
        let err = resolve(square(-1, 0, 100)).unwrap_err();
        assert!(matches!(err, CalibrationError::OutOfImage { x: -1, .. }));

        let err = resolve(square(1200, 0, 100)).unwrap_err();
        assert!(matches!(err, CalibrationError::OutOfImage { .. }));

        // Touching the far edge is fine: the region is half-open.
        assert!(resolve(square(1180, 924, 100)).is_ok());
    }

    #[test]
    fn tiny_board_is_degenerate() {
        let err = resolve(square(10, 10, 4)).unwrap_err();
        assert!(matches!(err, CalibrationError::Degenerate(4)));
        let err = resolve(square(10, 10, 0)).unwrap_err();
        assert!(matches!(err, CalibrationError::Degenerate(0)));
    }

    #[test]
    fn parses_annotator_output() {
        let corners = parse_corners("480,224\n1280,224\n 1280 , 1024\n480,1024\n\n").unwrap();
        assert_eq!(corners[0], Corner::new(480, 224));
        assert_eq!(corners[2], Corner::new(1280, 1024));
    }

    #[test]
    fn parse_reports_line_and_count() {
        let err = parse_corners("1,2\n3;4\n").unwrap_err();
        assert!(matches!(err, CalibrationError::Parse { line: 2, .. }));
        let err = parse_corners("1,2\n3,x\n").unwrap_err();
        assert!(matches!(err, CalibrationError::Parse { line: 2, .. }));
        let err = parse_corners("1,2\n3,4\n5,6\n").unwrap_err();
        assert!(matches!(err, CalibrationError::PointCount(3)));
    }

    #[test]
    fn reads_points_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "10,10\n110,10\n110,110\n10,110").unwrap();
        let corners = read_corners(file.path()).unwrap();
        assert_eq!(corners, square(10, 10, 100));
        assert!(matches!(read_corners("/nonexistent/points.txt"), Err(CalibrationError::Io(_))));
    }
}
