use bytes::BytesMut;
use image::ImageFormat;
use motion_common::frame::Frame;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::{rgb_to_frame, FrameSource, SourceError};

const SOI: &[u8] = &[0xFF, 0xD8];
const EOI: &[u8] = &[0xFF, 0xD9];
const READ_SIZE: usize = 64 * 1024;

/// Parse state for a Motion-JPEG byte stream.
enum ParseState {
    /// Looking for the start-of-image marker `FF D8`.
    SeekingStart,
    /// Buffer starts with a JPEG; stepping over marker segments by their
    /// declared length until start-of-scan. `scan_from` is the next marker.
    ReadingHeaders,
    /// Inside entropy-coded data; collecting bytes until `FF D9`.
    CollectingScan,
}

/// One step of the marker segment walk.
#[derive(Debug, PartialEq, Eq)]
enum Segment {
    /// Not enough bytes buffered to read the segment.
    Incomplete,
    /// A header segment; the next marker starts at the given offset.
    Header(usize),
    /// Start-of-scan; entropy-coded data starts at the given offset.
    StartOfScan(usize),
    /// End-of-image; the JPEG ends at the given offset.
    End(usize),
    /// Not a marker where one was expected.
    Malformed,
}

/// Reads a Motion-JPEG file: JPEG images stored back to back, optionally
/// separated by padding or container bytes.
pub struct MjpegFileSource {
    path: PathBuf,
    file: File,
    buffer: BytesMut,
    state: ParseState,
    /// Offset in `buffer` from which the end marker search resumes.
    scan_from: usize,
    read_size: usize,
    decoded: u64,
    skipped: u64,
}

impl MjpegFileSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file =
            File::open(path).map_err(|e| SourceError::Open(path.display().to_string(), e))?;
        info!(path = %path.display(), "opened MJPEG file");
        Ok(Self {
            path: path.to_path_buf(),
            file,
            buffer: BytesMut::with_capacity(256 * 1024),
            state: ParseState::SeekingStart,
            scan_from: 0,
            read_size: READ_SIZE,
            decoded: 0,
            skipped: 0,
        })
    }

    /// Pull the next complete JPEG out of the file, or `None` at end of file.
    fn next_jpeg(&mut self) -> Result<Option<BytesMut>, SourceError> {
        loop {
            match self.state {
                ParseState::SeekingStart => {
                    if let Some(pos) = find_subsequence(&self.buffer, SOI) {
                        // Drop everything before the marker, keep the marker
                        let _ = self.buffer.split_to(pos);
                        self.scan_from = SOI.len();
                        self.state = ParseState::ReadingHeaders;
                        continue;
                    }
                    // Keep the last byte in case the marker spans reads
                    if self.buffer.len() > 1 {
                        let _ = self.buffer.split_to(self.buffer.len() - 1);
                    }
                }
                ParseState::ReadingHeaders => match walk_segment(&self.buffer, self.scan_from) {
                    Segment::Incomplete => {}
                    Segment::Header(next) => {
                        self.scan_from = next;
                        continue;
                    }
                    Segment::StartOfScan(next) => {
                        self.scan_from = next;
                        self.state = ParseState::CollectingScan;
                        continue;
                    }
                    Segment::End(end) => {
                        let jpeg = self.buffer.split_to(end);
                        self.state = ParseState::SeekingStart;
                        return Ok(Some(jpeg));
                    }
                    Segment::Malformed => {
                        debug!(
                            offset = self.scan_from,
                            "unexpected JPEG header byte, scanning for end marker"
                        );
                        self.state = ParseState::CollectingScan;
                        continue;
                    }
                },
                ParseState::CollectingScan => {
                    if let Some(pos) = find_subsequence(&self.buffer[self.scan_from..], EOI) {
                        let end = self.scan_from + pos + EOI.len();
                        let jpeg = self.buffer.split_to(end);
                        self.state = ParseState::SeekingStart;
                        return Ok(Some(jpeg));
                    }
                    self.scan_from = self
                        .buffer
                        .len()
                        .saturating_sub(EOI.len() - 1)
                        .max(SOI.len());
                }
            }

            if !self.fill()? {
                if !matches!(self.state, ParseState::SeekingStart) {
                    warn!(
                        path = %self.path.display(),
                        bytes = self.buffer.len(),
                        "truncated JPEG at end of file, ignoring"
                    );
                }
                return Ok(None);
            }
        }
    }

    /// Append the next chunk of the file. Returns `false` at end of file.
    fn fill(&mut self) -> Result<bool, SourceError> {
        let mut chunk = vec![0u8; self.read_size];
        loop {
            match self.file.read(&mut chunk) {
                Ok(0) => return Ok(false),
                Ok(n) => {
                    self.buffer.extend_from_slice(&chunk[..n]);
                    return Ok(true);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(SourceError::Read(self.path.display().to_string(), e)),
            }
        }
    }
}

impl FrameSource for MjpegFileSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        loop {
            let Some(jpeg) = self.next_jpeg()? else {
                debug!(decoded = self.decoded, skipped = self.skipped, "end of MJPEG file");
                return Ok(None);
            };
            match decode_jpeg(&jpeg) {
                Ok(frame) => {
                    self.decoded += 1;
                    return Ok(Some(frame));
                }
                Err(e) => {
                    self.skipped += 1;
                    warn!(error = %e, bytes = jpeg.len(), "failed to decode JPEG, skipping frame");
                }
            }
        }
    }

    fn name(&self) -> &str {
        "mjpeg"
    }
}

fn decode_jpeg(data: &[u8]) -> Result<Frame, SourceError> {
    let img = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
        .map_err(|e| SourceError::Decode(e.to_string()))?;
    Ok(rgb_to_frame(img.to_rgb8())?)
}

/// Read the marker segment starting at `pos`.
///
/// Header segments carry a big-endian length that covers the length field
/// and the payload. Payloads may contain anything, including an embedded
/// thumbnail with its own end marker, so they are skipped whole.
fn walk_segment(buf: &[u8], pos: usize) -> Segment {
    match buf.get(pos) {
        None => return Segment::Incomplete,
        Some(&0xFF) => {}
        Some(_) => return Segment::Malformed,
    }
    // Any number of 0xFF fill bytes may precede the marker code
    let mut at = pos + 1;
    while buf.get(at) == Some(&0xFF) {
        at += 1;
    }
    let Some(&marker) = buf.get(at) else {
        return Segment::Incomplete;
    };
    let after = at + 1;
    match marker {
        0xD9 => Segment::End(after),
        // TEM and RSTn stand alone
        0x01 | 0xD0..=0xD7 => Segment::Header(after),
        0x00 | 0xD8 => Segment::Malformed,
        _ => {
            let Some(len) = buf.get(after..after + 2) else {
                return Segment::Incomplete;
            };
            let len = usize::from(u16::from_be_bytes([len[0], len[1]]));
            if len < 2 {
                return Segment::Malformed;
            }
            let next = after + len;
            if next > buf.len() {
                Segment::Incomplete
            } else if marker == 0xDA {
                Segment::StartOfScan(next)
            } else {
                Segment::Header(next)
            }
        }
    }
}

/// Find the position of `needle` in `haystack`.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Cursor;

    fn encode_jpeg(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(color));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
            .unwrap();
        buf
    }

    fn write_stream(parts: &[&[u8]]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mjpeg");
        std::fs::write(&path, parts.concat()).unwrap();
        (dir, path)
    }

    #[test]
    fn finds_subsequence() {
        assert_eq!(find_subsequence(b"abcFF", b"FF"), Some(3));
        assert_eq!(find_subsequence(b"abc", b"FF"), None);
        assert_eq!(find_subsequence(b"", b"FF"), None);
    }

    #[test]
    fn reads_back_to_back_jpegs() {
        let a = encode_jpeg(16, 8, [200, 10, 10]);
        let b = encode_jpeg(16, 8, [10, 200, 10]);
        let (_dir, path) = write_stream(&[a.as_slice(), b.as_slice()]);

        let mut source = MjpegFileSource::open(&path).unwrap();
        for _ in 0..2 {
            let frame = source.next_frame().unwrap().unwrap();
            assert_eq!(frame.resolution(), (8, 16));
            assert_eq!(frame.channels(), 3);
        }
        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(source.decoded, 2);
    }

    #[test]
    fn markers_split_across_reads() {
        let a = encode_jpeg(8, 8, [128, 128, 128]);
        let b = encode_jpeg(8, 8, [0, 0, 0]);
        let (_dir, path) = write_stream(&[b"\x00\x01junk".as_slice(), &a[..], &[0xFF], &b[..]]);

        let mut source = MjpegFileSource::open(&path).unwrap();
        source.read_size = 7;
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn undecodable_jpeg_is_skipped() {
        let good = encode_jpeg(8, 4, [50, 50, 50]);
        let bad: &[u8] = &[0xFF, 0xD8, 0x01, 0x02, 0x03, 0xFF, 0xD9];
        let (_dir, path) = write_stream(&[bad, good.as_slice()]);

        let mut source = MjpegFileSource::open(&path).unwrap();
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!(frame.resolution(), (4, 8));
        assert_eq!(source.skipped, 1);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn truncated_tail_ends_stream() {
        let good = encode_jpeg(8, 8, [90, 90, 90]);
        let truncated = &good[..good.len() / 2];
        let (_dir, path) = write_stream(&[good.as_slice(), truncated]);

        let mut source = MjpegFileSource::open(&path).unwrap();
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
    }

    /// `jpeg` with `thumbnail` stored in an APP1 segment right after SOI.
    fn with_thumbnail(jpeg: &[u8], thumbnail: &[u8]) -> Vec<u8> {
        let len = u16::try_from(thumbnail.len() + 2).unwrap();
        let mut out = vec![0xFF, 0xD8, 0xFF, 0xE1];
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(thumbnail);
        out.extend_from_slice(&jpeg[SOI.len()..]);
        out
    }

    #[test]
    fn walks_header_segments() {
        // APP0 with a 2-byte payload, EOI, then SOS with an empty header
        let buf = [0xFF, 0xE0, 0x00, 0x04, 1, 2, 0xFF, 0xD9, 0xFF, 0xDA, 0x00, 0x02];
        assert_eq!(walk_segment(&buf, 0), Segment::Header(6));
        assert_eq!(walk_segment(&buf, 6), Segment::End(8));
        assert_eq!(walk_segment(&buf, 8), Segment::StartOfScan(12));
        assert_eq!(walk_segment(&buf, 12), Segment::Incomplete);
        assert_eq!(walk_segment(&buf[..3], 0), Segment::Incomplete);
        assert_eq!(walk_segment(&buf[..5], 0), Segment::Incomplete);
        assert_eq!(walk_segment(&[0x12, 0x34], 0), Segment::Malformed);
        assert_eq!(walk_segment(&[0xFF, 0xFF, 0xD0], 0), Segment::Header(3));
    }

    #[test]
    fn embedded_thumbnail_does_not_split_the_frame() {
        let thumbnail = encode_jpeg(4, 4, [255, 255, 255]);
        let clip = with_thumbnail(&encode_jpeg(32, 16, [30, 60, 90]), &thumbnail);
        assert!(image::load_from_memory_with_format(&clip, ImageFormat::Jpeg).is_ok());
        let (_dir, path) = write_stream(&[clip.as_slice(), clip.as_slice()]);

        for read_size in [READ_SIZE, 7] {
            let mut source = MjpegFileSource::open(&path).unwrap();
            source.read_size = read_size;
            for _ in 0..2 {
                let frame = source.next_frame().unwrap().unwrap();
                assert_eq!(frame.resolution(), (16, 32), "read_size={read_size}");
            }
            assert!(source.next_frame().unwrap().is_none());
            assert_eq!((source.decoded, source.skipped), (2, 0));
        }
    }

    #[test]
    fn empty_file_is_empty_stream() {
        let (_dir, path) = write_stream(&[]);
        let mut source = MjpegFileSource::open(&path).unwrap();
        assert!(source.next_frame().unwrap().is_none());
    }
}
