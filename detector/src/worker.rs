use motion_common::config::{DetectionConfig, KernelWorkers};
use motion_common::frame::Frame;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, trace};

use crate::aggregate::{Aggregate, WorkerSummary};
use crate::background::BackgroundModel;
use crate::kernels::{differs_from_background, smooth, to_grayscale};
use crate::queue::WorkQueue;

/// A raw frame plus its position in the stream (1-based, after the background).
#[derive(Debug)]
pub struct WorkItem {
    pub seq: u64,
    pub frame: Frame,
}

/// Closes the queue if the owning worker unwinds, so a producer waiting on a
/// full bounded queue is released instead of waiting for consumers that are gone.
struct CloseOnPanic<'a, T> {
    queue: &'a WorkQueue<T>,
    worker: usize,
}

impl<T> Drop for CloseOnPanic<'_, T> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!(worker = self.worker, "worker panicked, closing work queue");
            self.queue.close();
        }
    }
}

/// Per-thread state of a pool worker.
///
/// The grayscale and smoothed buffers are allocated once at the stream's
/// resolution and overwritten for every frame.
pub struct Worker {
    id: usize,
    gray: Frame,
    smoothed: Frame,
    kernels: KernelWorkers,
    thresholds: DetectionConfig,
    measure_latency: bool,
}

impl Worker {
    pub fn new(
        id: usize,
        resolution: (usize, usize),
        kernels: KernelWorkers,
        thresholds: DetectionConfig,
        measure_latency: bool,
    ) -> Self {
        let (rows, cols) = resolution;
        Self {
            id,
            gray: Frame::zeroed_gray(rows, cols),
            smoothed: Frame::zeroed_gray(rows, cols),
            kernels,
            thresholds,
            measure_latency,
        }
    }

    /// Grayscale, smooth and compare one frame. Returns `true` on motion.
    ///
    /// Panics if the frame does not match the background resolution; the
    /// driver rejects such frames before they are queued.
    pub fn process(&mut self, frame: &Frame, background: &BackgroundModel) -> bool {
        assert!(
            background.accepts(frame),
            "worker {} got a {:?} frame for a {:?} background",
            self.id,
            frame.resolution(),
            background.resolution()
        );
        to_grayscale(frame, &mut self.gray, self.kernels.grayscale);
        smooth(&self.gray, &mut self.smoothed, self.kernels.smooth);
        differs_from_background(
            &self.smoothed,
            background.frame(),
            &self.thresholds,
            self.kernels.diff,
        )
    }

    /// Process frames until the queue is closed and drained.
    pub fn run(
        mut self,
        queue: &WorkQueue<WorkItem>,
        background: &BackgroundModel,
        aggregate: &Aggregate,
    ) -> WorkerSummary {
        debug!(worker = self.id, "worker started");
        let _guard = CloseOnPanic {
            queue,
            worker: self.id,
        };
        let mut summary = WorkerSummary::default();

        while let Some(WorkItem { seq, frame }) = queue.pop() {
            let started = self.measure_latency.then(Instant::now);
            let motion = self.process(&frame, background);
            drop(frame);

            if let Some(started) = started {
                summary.latency.record(started.elapsed());
            }
            summary.frames += 1;
            aggregate.record_frame(motion);
            if motion {
                summary.motion_frames += 1;
                debug!(worker = self.id, seq, "motion detected");
            } else {
                trace!(worker = self.id, seq, "no motion");
            }
        }

        debug!(
            worker = self.id,
            frames = summary.frames,
            motion_frames = summary.motion_frames,
            "queue closed, worker exiting"
        );
        summary
    }
}
