use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use ab_glyph::PxScale;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use log::trace;
use resvg::{tiny_skia, usvg};

use overlay::Square;

use crate::{
    config::{BoardStyle, Colour},
    fonts::FontCache,
    render::{RenderError, VectorImage},
};

/// Turns rendered SVG boards into RGB rasters of an exact size.
pub struct Rasterizer {
    fonts: FontCache,
    font_dir: PathBuf,
    scratch_dir: Option<PathBuf>,
}

impl Rasterizer {
    pub fn new(font_dir: impl AsRef<Path>) -> Self {
        let font_dir = font_dir.as_ref().to_path_buf();
        Self {
            fonts: FontCache::load(&font_dir),
            font_dir,
            scratch_dir: None,
        }
    }

    /// Directory for the intermediate SVG files; the system temp dir otherwise.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Rasterizes `svg` to `size x size` pixels.
    ///
    /// The SVG goes through a temporary file that is removed when this
    /// returns, whether it succeeds or not.
    pub fn rasterize(
        &self,
        svg: &VectorImage,
        size: u32,
        style: &BoardStyle,
    ) -> Result<RgbImage, RenderError> {
        let mut scratch = match &self.scratch_dir {
            Some(dir) => tempfile::Builder::new().suffix(".svg").tempfile_in(dir)?,
            None => tempfile::Builder::new().suffix(".svg").tempfile()?,
        };
        scratch.write_all(svg.0.as_bytes())?;
        scratch.flush()?;
        trace!("rasterizing {} at {size}px", scratch.path().display());

        let data = fs::read(scratch.path())?;
        let tree = usvg::Tree::from_data(&data, &usvg::Options::default())
            .map_err(|e| RenderError::Svg(e.to_string()))?;

        let mut pixmap = tiny_skia::Pixmap::new(size, size).ok_or(RenderError::Pixmap(size))?;
        let tree_size = tree.size();
        let transform = tiny_skia::Transform::from_scale(
            size as f32 / tree_size.width(),
            size as f32 / tree_size.height(),
        );
        resvg::render(&tree, transform, &mut pixmap.as_mut());

        let mut raster = RgbImage::new(size, size);
        for (px, out) in pixmap.pixels().iter().zip(raster.pixels_mut()) {
            let c = px.demultiply();
            *out = Rgb([c.red(), c.green(), c.blue()]);
        }

        if style.coordinates {
            self.draw_coordinates(&mut raster, style)?;
        }
        Ok(raster)
    }

    /// File letters along the bottom rank and rank digits along the a-file,
    /// tucked into the square corners.
    fn draw_coordinates(&self, raster: &mut RgbImage, style: &BoardStyle) -> Result<(), RenderError> {
        let font = self
            .fonts
            .first()
            .ok_or_else(|| RenderError::NoFont(self.font_dir.display().to_string()))?;

        let cell = raster.width() as f32 / 8.0;
        let px = (cell * 0.22).max(6.0);
        let scale = PxScale { x: px, y: px };
        let pad = (cell * 0.05).round() as i32;

        for square in Square::all() {
            let on_bottom = square.rank() == 0;
            let on_left = square.file() == 0;
            if !on_bottom && !on_left {
                continue;
            }
            // Text takes the colour of the opposite square shade.
            let is_light = (square.file() + square.rank()) % 2 == 1;
            let ink: Colour = if is_light { style.dark } else { style.light };
            let x0 = (square.file() as f32 * cell) as i32;
            let y0 = (square.row_from_top() as f32 * cell) as i32;

            if on_left {
                let label = ((b'1' + square.rank()) as char).to_string();
                draw_text_mut(raster, ink.rgb(), x0 + pad, y0 + pad, scale, font, &label);
            }
            if on_bottom {
                let label = ((b'a' + square.file()) as char).to_string();
                let x = x0 + cell as i32 - px as i32 - pad;
                let y = y0 + cell as i32 - px as i32 - pad;
                draw_text_mut(raster, ink.rgb(), x.max(x0), y.max(y0), scale, font, &label);
            }
        }
        Ok(())
    }
}
