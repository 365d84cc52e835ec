/// Sample layout of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Three interleaved 8-bit channels, as delivered by a frame source.
    Raw,
    /// One 8-bit channel (grayscale or any derived image).
    Gray,
}

impl FrameKind {
    pub fn channels(self) -> usize {
        match self {
            FrameKind::Raw => 3,
            FrameKind::Gray => 1,
        }
    }
}

/// A rectangular grid of 8-bit samples.
///
/// Samples are stored row-major with channels interleaved, so the sample for
/// channel `c` of pixel `(i, j)` lives at `(i * cols + j) * channels + c`.
///
/// A frame has no identity beyond its position in the stream. It is moved
/// (never shared) from the source into the work queue and from there into
/// the worker that dequeues it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    rows: usize,
    cols: usize,
    kind: FrameKind,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap interleaved 3-channel samples.
    pub fn raw(rows: usize, cols: usize, data: Vec<u8>) -> Result<Self, FrameError> {
        Self::with_kind(rows, cols, FrameKind::Raw, data)
    }

    /// Wrap single-channel samples.
    pub fn gray(rows: usize, cols: usize, data: Vec<u8>) -> Result<Self, FrameError> {
        Self::with_kind(rows, cols, FrameKind::Gray, data)
    }

    /// A black single-channel frame, used for per-worker scratch buffers.
    pub fn zeroed_gray(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            kind: FrameKind::Gray,
            data: vec![0; rows * cols],
        }
    }

    /// A raw frame where every pixel carries the same three samples.
    pub fn filled_raw(rows: usize, cols: usize, pixel: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(rows * cols * 3);
        for _ in 0..rows * cols {
            data.extend_from_slice(&pixel);
        }
        Self {
            rows,
            cols,
            kind: FrameKind::Raw,
            data,
        }
    }

    fn with_kind(
        rows: usize,
        cols: usize,
        kind: FrameKind,
        data: Vec<u8>,
    ) -> Result<Self, FrameError> {
        let expected = rows * cols * kind.channels();
        if data.len() != expected {
            return Err(FrameError::SizeMismatch {
                rows,
                cols,
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            rows,
            cols,
            kind,
            data,
        })
    }

    // -- Accessors --------------------------------------------------------------

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn channels(&self) -> usize {
        self.kind.channels()
    }

    /// `(rows, cols)`.
    pub fn resolution(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of pixels (not samples).
    pub fn pixel_count(&self) -> usize {
        self.rows * self.cols
    }

    /// Length of one row in samples.
    pub fn row_len(&self) -> usize {
        self.cols * self.channels()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Samples of row `i`.
    pub fn row(&self, i: usize) -> &[u8] {
        let len = self.row_len();
        &self.data[i * len..(i + 1) * len]
    }

    /// Samples of pixel `(i, j)`; one element for gray frames, three for raw.
    pub fn pixel(&self, i: usize, j: usize) -> &[u8] {
        let ch = self.channels();
        let start = (i * self.cols + j) * ch;
        &self.data[start..start + ch]
    }

    /// True if `other` has the same dimensions and layout.
    pub fn same_shape(&self, other: &Frame) -> bool {
        self.rows == other.rows && self.cols == other.cols && self.kind == other.kind
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame {rows}x{cols} needs {expected} samples, got {got}")]
    SizeMismatch {
        rows: usize,
        cols: usize,
        expected: usize,
        got: usize,
    },
}
