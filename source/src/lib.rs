//! Frame acquisition.
//!
//! A [`FrameSource`] hands raw 3-channel frames to the pipeline driver one at
//! a time. Decoding is delegated to the `image` crate; this crate only knows
//! how to find image boundaries in the supported containers.

mod image_dir;
mod mjpeg;

use image::RgbImage;
use motion_common::frame::{Frame, FrameError};
use std::collections::VecDeque;
use std::path::Path;

pub use image_dir::ImageDirSource;
pub use mjpeg::MjpegFileSource;

/// A stream of raw frames.
pub trait FrameSource: Send {
    /// Returns the next frame, or `Ok(None)` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        (**self).next_frame()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Open `path` as a frame source.
///
/// Directories are read as image sequences, `.mjpeg`/`.mjpg` files as
/// Motion-JPEG streams.
pub fn open(path: &Path) -> Result<Box<dyn FrameSource>, SourceError> {
    let meta =
        std::fs::metadata(path).map_err(|e| SourceError::Open(path.display().to_string(), e))?;
    if meta.is_dir() {
        return Ok(Box::new(ImageDirSource::open(path)?));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mjpeg") | Some("mjpg") => Ok(Box::new(MjpegFileSource::open(path)?)),
        _ => Err(SourceError::Unsupported(path.display().to_string())),
    }
}

/// Frames held in memory, yielded in insertion order.
#[derive(Debug, Default)]
pub struct MemorySource {
    frames: VecDeque<Frame>,
}

impl MemorySource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        Ok(self.frames.pop_front())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

pub(crate) fn rgb_to_frame(img: RgbImage) -> Result<Frame, FrameError> {
    let rows = img.height() as usize;
    let cols = img.width() as usize;
    Frame::raw(rows, cols, img.into_raw())
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to open {0}: {1}")]
    Open(String, std::io::Error),
    #[error("unsupported source {0}: expected an image directory or an .mjpeg/.mjpg file")]
    Unsupported(String),
    #[error("failed to read {0}: {1}")]
    Read(String, std::io::Error),
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("invalid frame: {0}")]
    Frame(#[from] FrameError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_preserves_order() {
        let frames = (0..3u8).map(|v| Frame::filled_raw(2, 2, [v, v, v]));
        let mut source = MemorySource::new(frames);
        assert_eq!(source.remaining(), 3);
        for v in 0..3u8 {
            let frame = source.next_frame().unwrap().unwrap();
            assert_eq!(frame.pixel(0, 0), &[v, v, v]);
        }
        assert!(source.next_frame().unwrap().is_none());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn open_missing_path_fails() {
        let err = open(Path::new("/nonexistent/video.mjpeg")).err().unwrap();
        assert!(matches!(err, SourceError::Open(..)));
    }

    #[test]
    fn open_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.avi");
        std::fs::write(&path, b"not a video").unwrap();
        let err = open(&path).err().unwrap();
        assert!(matches!(err, SourceError::Unsupported(_)));
    }

    #[test]
    fn open_picks_source_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let mjpeg = dir.path().join("clip.MJPG");
        std::fs::write(&mjpeg, b"").unwrap();
        assert_eq!(open(&mjpeg).unwrap().name(), "mjpeg");
        assert_eq!(open(dir.path()).unwrap().name(), "image-dir");
    }

    #[test]
    fn rgb_image_converts_row_major() {
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(2, 1, image::Rgb([1, 2, 3]));
        let frame = rgb_to_frame(img).unwrap();
        assert_eq!(frame.resolution(), (2, 3));
        assert_eq!(frame.pixel(1, 2), &[1, 2, 3]);
    }
}
