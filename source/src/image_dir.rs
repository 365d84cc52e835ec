use motion_common::frame::Frame;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{rgb_to_frame, FrameSource, SourceError};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Plays back a directory of still images in filename order.
///
/// Files without a recognised image extension are ignored. Frames are named
/// so that lexicographic order is playback order (`frame_0001.png`, ...).
pub struct ImageDirSource {
    pending: VecDeque<PathBuf>,
}

impl ImageDirSource {
    pub fn open(dir: &Path) -> Result<Self, SourceError> {
        let entries =
            std::fs::read_dir(dir).map_err(|e| SourceError::Open(dir.display().to_string(), e))?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SourceError::Read(dir.display().to_string(), e))?;
            let path = entry.path();
            if path.is_file() && has_image_extension(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        info!(dir = %dir.display(), frames = paths.len(), "opened image directory");
        Ok(Self {
            pending: paths.into(),
        })
    }
}

impl FrameSource for ImageDirSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        while let Some(path) = self.pending.pop_front() {
            match image::open(&path) {
                Ok(img) => return Ok(Some(rgb_to_frame(img.to_rgb8())?)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to decode image, skipping frame");
                }
            }
        }
        Ok(None)
    }

    fn name(&self) -> &str {
        "image-dir"
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}
