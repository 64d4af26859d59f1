use image::{RgbImage, imageops};
use thiserror::Error;

use crate::calibration::BackgroundCalibration;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("board raster is {raster_w}x{raster_h} but the calibrated region is {region_w}x{region_h}")]
pub struct DimensionMismatchError {
    pub raster_w: u32,
    pub raster_h: u32,
    pub region_w: u32,
    pub region_h: u32,
}

/// Pastes `raster` over the calibrated region of a copy of the background.
///
/// The raster must already be exactly the size of the region. It is never
/// resized here, since that would move pixels away from their labels.
pub fn composite(
    calibration: &BackgroundCalibration,
    raster: &RgbImage,
) -> Result<RgbImage, DimensionMismatchError> {
    let bounds = calibration.bounds();
    let (raster_w, raster_h) = raster.dimensions();
    if (raster_w, raster_h) != (bounds.width(), bounds.height()) {
        return Err(DimensionMismatchError {
            raster_w,
            raster_h,
            region_w: bounds.width(),
            region_h: bounds.height(),
        });
    }

    let mut frame = calibration.image().clone();
    imageops::replace(&mut frame, raster, bounds.min_x as i64, bounds.min_y as i64);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{Corner, DEFAULT_SIDE_TOLERANCE};
    use image::Rgb;

    const BG: Rgb<u8> = Rgb([10, 20, 30]);

    fn calibration(x0: i64, y0: i64, side: i64) -> BackgroundCalibration {
        let background = RgbImage::from_pixel(320, 240, BG);
        let corners = [
            Corner::new(x0, y0),
            Corner::new(x0 + side, y0),
            Corner::new(x0 + side, y0 + side),
            Corner::new(x0, y0 + side),
        ];
        BackgroundCalibration::resolve(background, corners, DEFAULT_SIDE_TOLERANCE).unwrap()
    }

    fn checker(side: u32) -> RgbImage {
        RgbImage::from_fn(side, side, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                Rgb([240, 217, 181])
            } else {
                Rgb([181, 136, 99])
            }
        })
    }

    #[test]
    fn overwrites_exactly_the_region() {
        let cal = calibration(40, 30, 160);
        let raster = checker(160);
        let frame = composite(&cal, &raster).unwrap();
        assert_eq!(frame.dimensions(), (320, 240));

        let b = cal.bounds();
        for (x, y, px) in frame.enumerate_pixels() {
            let inside = x >= b.min_x && x < b.max_x && y >= b.min_y && y < b.max_y;
            if inside {
                assert_eq!(*px, *raster.get_pixel(x - b.min_x, y - b.min_y), "({x},{y})");
            } else {
                assert_eq!(*px, BG, "({x},{y}) outside the region changed");
            }
        }
    }

    #[test]
    fn background_is_left_untouched() {
        let cal = calibration(0, 0, 64);
        let before = cal.image().clone();
        composite(&cal, &checker(64)).unwrap();
        assert_eq!(cal.image().as_raw(), before.as_raw());
    }

    #[test]
    fn compositing_is_deterministic() {
        let cal = calibration(100, 50, 128);
        let raster = checker(128);
        let a = composite(&cal, &raster).unwrap();
        let b = composite(&cal, &raster).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn wrong_raster_size_is_an_error() {
        let cal = calibration(40, 30, 160);
        let err = composite(&cal, &checker(159)).unwrap_err();
        assert_eq!(
            err,
            DimensionMismatchError {
                raster_w: 159,
                raster_h: 159,
                region_w: 160,
                region_h: 160
            }
        );
        let tall = RgbImage::new(160, 161);
        assert!(composite(&cal, &tall).is_err());
    }
}
