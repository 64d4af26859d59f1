use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use image::{Rgb, RgbImage};
use overlay::{BackgroundCalibration, Corner, Square, SquareMapper, calibration::DEFAULT_SIDE_TOLERANCE, composite};
use std::hint::black_box;

fn calibration() -> BackgroundCalibration {
    let background = RgbImage::from_pixel(1920, 1080, Rgb([32, 32, 40]));
    let corners = [
        Corner::new(560, 140),
        Corner::new(1360, 140),
        Corner::new(1360, 940),
        Corner::new(560, 940),
    ];
    BackgroundCalibration::resolve(background, corners, DEFAULT_SIDE_TOLERANCE).unwrap()
}

fn bench_overlay(c: &mut Criterion) {
    let cal = calibration();
    let raster = RgbImage::from_fn(800, 800, |x, y| {
        if (x / 100 + y / 100) % 2 == 0 {
            Rgb([255, 206, 158])
        } else {
            Rgb([209, 139, 71])
        }
    });

    c.bench_function("composite_800", |b| {
        b.iter(|| black_box(composite(&cal, &raster)).unwrap())
    });

    c.bench_function("label_64_squares", |b| {
        b.iter_batched(
            || SquareMapper::new(&cal),
            |m| {
                for sq in Square::all() {
                    black_box(m.label(sq, true));
                }
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_overlay);
criterion_main!(benches);
