use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use image::{ImageFormat, RgbImage};
use log::debug;

use crate::record::MoveRecord;

pub const MANIFEST_NAME: &str = "moves.json";

pub fn episode_dir(dataset_dir: &Path, index: usize) -> PathBuf {
    dataset_dir.join(format!("game_{index}"))
}

/// Output of one episode: `game_<index>/move_<n>.<ext>` plus `moves.json`.
pub struct EpisodeWriter {
    dir: PathBuf,
    ext: String,
    format: ImageFormat,
}

impl EpisodeWriter {
    /// Creates the episode directory. The manifest and frames left over from
    /// an earlier run are removed so every image present belongs to this run.
    pub fn create(dataset_dir: &Path, index: usize, ext: &str, format: ImageFormat) -> io::Result<Self> {
        let dir = episode_dir(dataset_dir, index);
        fs::create_dir_all(&dir)?;
        let mut removed = 0;
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if is_episode_output(&name.to_string_lossy()) && entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        if removed > 0 {
            debug!("removed {removed} stale file(s) in {}", dir.display());
        }
        Ok(Self {
            dir,
            ext: ext.to_string(),
            format,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes one frame and returns its file name relative to the episode dir.
    pub fn write_frame(&self, move_number: usize, frame: &RgbImage) -> image::ImageResult<String> {
        let name = format!("move_{move_number}.{}", self.ext);
        frame.save_with_format(self.dir.join(&name), self.format)?;
        Ok(name)
    }

    /// Writes the manifest through a temporary file so a partially written
    /// `moves.json` never exists.
    pub fn finish(self, records: &[MoveRecord]) -> io::Result<PathBuf> {
        let tmp = self.dir.join(format!("{MANIFEST_NAME}.tmp"));
        let path = self.dir.join(MANIFEST_NAME);

        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer_pretty(&mut writer, records)?;
        writer.write_all(b"\n")?;
        writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }
}

/// `moves.json`, its temporary file, or a `move_<n>.<ext>` frame.
fn is_episode_output(name: &str) -> bool {
    if name == MANIFEST_NAME || name == format!("{MANIFEST_NAME}.tmp") {
        return true;
    }
    name.strip_prefix("move_")
        .and_then(|rest| rest.split_once('.'))
        .is_some_and(|(n, ext)| !n.is_empty() && !ext.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

pub fn read_manifest(path: impl AsRef<Path>) -> io::Result<Vec<MoveRecord>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}
