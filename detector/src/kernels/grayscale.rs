use motion_common::frame::{Frame, FrameKind};

use super::rows::for_each_row_block;

/// Convert a raw frame into `gray`, reusing its buffer.
///
/// Each output sample is the truncating mean of the pixel's three channels.
pub fn to_grayscale(raw: &Frame, gray: &mut Frame, workers: usize) {
    assert_eq!(raw.kind(), FrameKind::Raw, "grayscale input must be raw");
    assert_eq!(gray.kind(), FrameKind::Gray, "grayscale output must be gray");
    assert_eq!(raw.resolution(), gray.resolution(), "grayscale buffers differ in size");

    let cols = raw.cols();
    let src = raw.as_bytes();
    for_each_row_block(gray.as_bytes_mut(), cols, workers, |rows, block| {
        let src_rows = &src[rows.start * cols * 3..rows.end * cols * 3];
        for (out, px) in block.iter_mut().zip(src_rows.chunks_exact(3)) {
            *out = ((u16::from(px[0]) + u16::from(px[1]) + u16::from(px[2])) / 3) as u8;
        }
    });
}

/// Allocating variant of [`to_grayscale`].
pub fn grayscale(raw: &Frame, workers: usize) -> Frame {
    let mut gray = Frame::zeroed_gray(raw.rows(), raw.cols());
    to_grayscale(raw, &mut gray, workers);
    gray
}
