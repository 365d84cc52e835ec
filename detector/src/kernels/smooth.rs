use motion_common::frame::{Frame, FrameKind};

use super::rows::for_each_row_block;

/// 3x3 mean filter from `gray` into `out`.
///
/// Border pixels average only the neighbours inside the image: 4 samples in
/// a corner, 6 along an edge, 9 in the interior. Input and output must be
/// distinct buffers.
pub fn smooth(gray: &Frame, out: &mut Frame, workers: usize) {
    assert_eq!(gray.kind(), FrameKind::Gray, "smoothing input must be gray");
    assert!(gray.same_shape(out), "smoothing buffers differ in shape");

    let (rows, cols) = gray.resolution();
    if cols == 0 {
        return;
    }
    let src = gray.as_bytes();
    for_each_row_block(out.as_bytes_mut(), cols, workers, |range, block| {
        for (out_row, i) in block.chunks_exact_mut(cols).zip(range) {
            let top = i.saturating_sub(1);
            let bottom = (i + 1).min(rows - 1);
            for (j, out_px) in out_row.iter_mut().enumerate() {
                let left = j.saturating_sub(1);
                let right = (j + 1).min(cols - 1);
                let sum: u32 = (top..=bottom)
                    .map(|r| {
                        src[r * cols + left..=r * cols + right]
                            .iter()
                            .map(|&v| u32::from(v))
                            .sum::<u32>()
                    })
                    .sum();
                let neighbours = ((bottom - top + 1) * (right - left + 1)) as u32;
                *out_px = (sum / neighbours) as u8;
            }
        }
    });
}

/// Allocating variant of [`smooth`].
pub fn smoothed(gray: &Frame, workers: usize) -> Frame {
    let mut out = Frame::zeroed_gray(gray.rows(), gray.cols());
    smooth(gray, &mut out, workers);
    out
}
