use motion_common::config::KernelWorkers;
use motion_common::frame::{Frame, FrameKind};

use crate::kernels::{grayscale, smoothed};

/// Grayscale, smoothed reference frame every candidate is compared against.
///
/// Built once from the first frame of the stream before any worker starts,
/// then only ever read.
#[derive(Debug)]
pub struct BackgroundModel {
    frame: Frame,
}

impl BackgroundModel {
    /// Run the first two stages over `first`.
    pub fn build(first: &Frame, workers: &KernelWorkers) -> Self {
        let gray = grayscale(first, workers.grayscale);
        Self {
            frame: smoothed(&gray, workers.smooth),
        }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn resolution(&self) -> (usize, usize) {
        self.frame.resolution()
    }

    /// True if `raw` can be compared against this background.
    pub fn accepts(&self, raw: &Frame) -> bool {
        raw.kind() == FrameKind::Raw && raw.resolution() == self.resolution()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_is_gray_and_smoothed() {
        let mut data = Vec::new();
        for i in 0..9u8 {
            data.extend_from_slice(&[i * 10, i * 10, i * 10]);
        }
        let first = Frame::raw(3, 3, data).unwrap();
        let model = BackgroundModel::build(&first, &KernelWorkers::default());

        assert_eq!(model.frame().kind(), FrameKind::Gray);
        assert_eq!(model.resolution(), (3, 3));
        // centre pixel is the mean of 0..=80 step 10
        assert_eq!(model.frame().pixel(1, 1), &[40]);
    }

    #[test]
    fn nested_parallelism_builds_identical_model() {
        let data: Vec<u8> = (0..40 * 30 * 3).map(|i| (i * 13 % 256) as u8).collect();
        let first = Frame::raw(40, 30, data).unwrap();
        let sequential = BackgroundModel::build(&first, &KernelWorkers::default());
        let parallel = BackgroundModel::build(
            &first,
            &KernelWorkers {
                grayscale: 4,
                smooth: 3,
                diff: 2,
            },
        );
        assert_eq!(sequential.frame(), parallel.frame());
    }

    #[test]
    fn accepts_only_matching_raw_frames() {
        let model = BackgroundModel::build(&Frame::filled_raw(4, 6, [1, 2, 3]), &KernelWorkers::default());
        assert!(model.accepts(&Frame::filled_raw(4, 6, [9, 9, 9])));
        assert!(!model.accepts(&Frame::filled_raw(6, 4, [9, 9, 9])));
        assert!(!model.accepts(&Frame::zeroed_gray(4, 6)));
    }
}
