use std::{fs::read_dir, path::Path};

use ab_glyph::{Font, FontArc};
use log::{debug, warn};

/// Glyphs a font must provide to label files and ranks.
pub const COORDINATE_GLYPHS: &str = "abcdefgh12345678";

pub struct FontCache {
    fonts: Vec<FontArc>,
}

impl FontCache {
    /// Loads every `.ttf`/`.otf` in `dir` that can draw coordinate labels,
    /// in file name order so runs are deterministic.
    pub fn load(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let mut paths: Vec<_> = read_dir(dir)
            .ok()
            .into_iter()
            .flat_map(|rd| rd.filter_map(|e| e.ok()))
            .map(|e| e.path())
            .filter(|p| {
                matches!(
                    p.extension().and_then(|s| s.to_str()),
                    Some("ttf") | Some("otf")
                )
            })
            .collect();
        paths.sort();

        let fonts: Vec<FontArc> = paths
            .iter()
            .filter_map(|path| {
                let font = std::fs::read(path)
                    .ok()
                    .and_then(|bytes| FontArc::try_from_vec(bytes).ok());
                if font.is_none() {
                    warn!("skipping unreadable font {}", path.display());
                }
                font
            })
            .filter(|f| COORDINATE_GLYPHS.chars().all(|ch| f.glyph_id(ch).0 != 0))
            .collect();

        debug!("loaded {} font(s) from {}", fonts.len(), dir.display());
        FontCache { fonts }
    }

    pub fn first(&self) -> Option<&FontArc> {
        self.fonts.first()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}
