use std::{fmt, fs, path::Path, path::PathBuf, str::FromStr};

use image::{ImageFormat, Rgb};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use overlay::calibration::DEFAULT_SIDE_TOLERANCE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid colour `{0}`, expected #rrggbb")]
    Colour(String),
    #[error("{0}")]
    Invalid(String),
}

/// `#rrggbb` colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Colour(pub [u8; 3]);

impl Colour {
    pub fn rgb(self) -> Rgb<u8> {
        Rgb(self.0)
    }
}

impl FromStr for Colour {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(ConfigError::Colour(s.to_string()));
        }
        let mut out = [0u8; 3];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[2 * i..2 * i + 2], 16)
                .map_err(|_| ConfigError::Colour(s.to_string()))?;
        }
        Ok(Colour(out))
    }
}

impl TryFrom<String> for Colour {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Colour> for String {
    fn from(c: Colour) -> Self {
        c.to_string()
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardStyle {
    pub light: Colour,
    pub dark: Colour,
    pub highlight: Colour,
    pub highlight_last_move: bool, // tint the from/to squares of the last move
    pub coordinates: bool,         // draw a-h / 1-8 onto the raster itself
}

impl Default for BoardStyle {
    fn default() -> Self {
        Self {
            light: Colour([0xff, 0xce, 0x9e]),
            dark: Colour([0xd1, 0x8b, 0x47]),
            highlight: Colour([0xcd, 0xd1, 0x6a]),
            highlight_last_move: false,
            coordinates: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub dataset_dir: PathBuf,     // "dataset"
    pub background_path: PathBuf, // screenshot the board is pasted into
    pub corners_path: PathBuf,    // four `x,y` lines from the corner picker
    pub moves_per_game: usize,
    pub first_episode: usize,
    pub episodes: usize,
    pub normalize: bool,
    pub seed: u64,
    pub workers: usize,
    pub side_tolerance: f64,
    pub image_ext: String,
    pub font_dir: PathBuf,
    pub style: BoardStyle,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            dataset_dir: PathBuf::from("dataset"),
            background_path: PathBuf::from("background.png"),
            corners_path: PathBuf::from("border_points.txt"),
            moves_per_game: 40,
            first_episode: 0,
            episodes: 1,
            normalize: false,
            seed: 0,
            workers: 1,
            side_tolerance: DEFAULT_SIDE_TOLERANCE,
            image_ext: "png".to_string(),
            font_dir: PathBuf::from("assets/fonts"),
            style: BoardStyle::default(),
        }
    }
}

impl DatasetConfig {
    /// Reads a JSON config; missing fields fall back to the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn image_format(&self) -> Result<ImageFormat, ConfigError> {
        ImageFormat::from_extension(&self.image_ext)
            .filter(|f| f.writing_enabled())
            .ok_or_else(|| ConfigError::Invalid(format!("cannot write `{}` images", self.image_ext)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if !self.side_tolerance.is_finite() || self.side_tolerance < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "side_tolerance must be a non-negative number, got {}",
                self.side_tolerance
            )));
        }
        if self.first_episode.checked_add(self.episodes).is_none() {
            return Err(ConfigError::Invalid(format!(
                "first_episode {} + episodes {} overflows",
                self.first_episode, self.episodes
            )));
        }
        if self.style.coordinates {
            return Err(ConfigError::Invalid(
                "style.coordinates must be off when compositing onto a background".into(),
            ));
        }
        self.image_format()?;
        Ok(())
    }

    pub fn episode_indices(&self) -> std::ops::Range<usize> {
        self.first_episode..self.first_episode.saturating_add(self.episodes)
    }
}
