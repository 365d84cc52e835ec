use motion_common::config::DetectionConfig;
use motion_common::frame::Frame;

use super::rows::sum_over_rows;

/// Number of pixels whose absolute difference exceeds `min_diff`.
pub fn differing_pixels(frame: &Frame, background: &Frame, min_diff: u8, workers: usize) -> usize {
    assert!(frame.same_shape(background), "frame and background differ in shape");

    let row_len = frame.row_len();
    let a = frame.as_bytes();
    let b = background.as_bytes();
    sum_over_rows(frame.rows(), workers, |range| {
        let span = range.start * row_len..range.end * row_len;
        a[span.clone()]
            .iter()
            .zip(&b[span])
            .filter(|&(&x, &y)| x.abs_diff(y) > min_diff)
            .count()
    })
}

/// True if more than `perc` of the pixels differ from the background.
///
/// An image with no pixels never shows motion.
pub fn differs_from_background(
    frame: &Frame,
    background: &Frame,
    thresholds: &DetectionConfig,
    workers: usize,
) -> bool {
    let total = frame.pixel_count();
    if total == 0 {
        return false;
    }
    let differing = differing_pixels(frame, background, thresholds.min_diff, workers);
    differing as f64 / total as f64 > thresholds.perc
}
