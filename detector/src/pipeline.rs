//! Pipeline driver.
//!
//! ```text
//! FrameSource ──> producer loop ──push──> WorkQueue ──pop──> Worker x N ──> Aggregate
//!                  (caller thread)                            (named threads)
//! ```
//!
//! The background model is built on the caller thread before any worker is
//! spawned, so workers only ever read it. The producer closes the queue
//! once the source is exhausted (or fails) and the workers drain whatever
//! is still queued before exiting.

use chrono::Utc;
use motion_common::config::{Config, KernelWorkers};
use motion_common::frame::FrameKind;
use motion_source::{FrameSource, SourceError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info};

use crate::aggregate::{Aggregate, WorkerSummary};
use crate::background::BackgroundModel;
use crate::queue::WorkQueue;
use crate::report::{millis, RunReport};
use crate::worker::{WorkItem, Worker};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("frame source error: {0}")]
    Source(#[from] SourceError),
    #[error("frame source yielded no frames")]
    EmptyStream,
    #[error("background frame must have 3 channels, got {0}")]
    BackgroundLayout(usize),
    #[error(
        "frame {seq} is {got_rows}x{got_cols} with {got_channels} channel(s), \
         background is {rows}x{cols} with 3"
    )]
    ResolutionMismatch {
        seq: u64,
        rows: usize,
        cols: usize,
        got_rows: usize,
        got_cols: usize,
        got_channels: usize,
    },
    #[error("failed to spawn worker thread: {0}")]
    Spawn(std::io::Error),
    #[error("{0} worker thread(s) panicked")]
    WorkerPanicked(usize),
}

pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Consume `source` to the end and count the frames that show motion.
    ///
    /// The first frame becomes the background; every following frame is
    /// processed exactly once by one of the pool workers.
    pub fn run<S: FrameSource + ?Sized>(&self, source: &mut S) -> Result<RunReport, PipelineError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let workers = self.config.pipeline.workers.max(1);
        let kernels = self.config.pipeline.kernel_workers();

        let first = source.next_frame()?.ok_or(PipelineError::EmptyStream)?;
        if first.kind() != FrameKind::Raw {
            return Err(PipelineError::BackgroundLayout(first.channels()));
        }
        let background = Arc::new(BackgroundModel::build(&first, &kernels));
        drop(first);

        let (rows, cols) = background.resolution();
        info!(
            source = source.name(),
            rows,
            cols,
            workers,
            grayscale_workers = kernels.grayscale,
            smooth_workers = kernels.smooth,
            diff_workers = kernels.diff,
            min_diff = self.config.detection.min_diff,
            perc = self.config.detection.perc,
            "background model ready, starting workers"
        );

        let queue = Arc::new(match self.config.pipeline.queue_capacity {
            0 => WorkQueue::unbounded(),
            capacity => WorkQueue::bounded(capacity),
        });
        let aggregate = Arc::new(Aggregate::default());

        let streaming = Instant::now();
        let handles = self.spawn_workers(workers, kernels, &queue, &background, &aggregate)?;

        let produced = produce(source, &queue, &background);
        if let Err(e) = &produced {
            error!(error = %e, "stopping frame intake");
        }
        queue.close();
        debug!(queued = queue.size(), "input closed, waiting for workers to drain");
        let joined = join_workers(handles);

        let frames_pushed = produced?;
        let summaries = joined?;
        let streaming_time = streaming.elapsed();

        let totals = WorkerSummary::merge_all(&summaries);
        let frames_processed = aggregate.frames_processed();
        let motion_frames = aggregate.motion_frames();
        debug_assert_eq!(totals.frames, frames_processed);
        debug_assert_eq!(totals.motion_frames, motion_frames);

        let report = RunReport {
            started_at,
            source: source.name().to_string(),
            rows,
            cols,
            workers,
            grayscale_workers: kernels.grayscale,
            smooth_workers: kernels.smooth,
            diff_workers: kernels.diff,
            frames_pushed,
            frames_processed,
            motion_frames,
            avg_latency_ms: totals.latency.average().map(millis),
            avg_service_time_ms: (frames_processed > 0)
                .then(|| millis(streaming_time) / frames_processed as f64),
            elapsed_ms: millis(clock.elapsed()),
        };

        info!(
            frames = frames_processed,
            motion_frames,
            elapsed_ms = format!("{:.0}", report.elapsed_ms),
            "pipeline finished"
        );
        Ok(report)
    }

    fn spawn_workers(
        &self,
        workers: usize,
        kernels: KernelWorkers,
        queue: &Arc<WorkQueue<WorkItem>>,
        background: &Arc<BackgroundModel>,
        aggregate: &Arc<Aggregate>,
    ) -> Result<Vec<JoinHandle<WorkerSummary>>, PipelineError> {
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let worker = Worker::new(
                id,
                background.resolution(),
                kernels,
                self.config.detection,
                self.config.pipeline.measure_latency,
            );
            let worker_queue = Arc::clone(queue);
            let worker_background = Arc::clone(background);
            let worker_aggregate = Arc::clone(aggregate);

            let spawned = thread::Builder::new()
                .name(format!("motion-worker-{id}"))
                .spawn(move || worker.run(&worker_queue, &worker_background, &worker_aggregate));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    error!(error = %e, worker = id, "failed to spawn worker thread");
                    queue.close();
                    if let Err(joined) = join_workers(handles) {
                        error!(error = %joined, "worker pool did not shut down cleanly");
                    }
                    return Err(PipelineError::Spawn(e));
                }
            }
        }
        Ok(handles)
    }
}

/// Move frames from the source into the queue until the source runs dry.
/// Returns the number of frames queued.
fn produce<S: FrameSource + ?Sized>(
    source: &mut S,
    queue: &WorkQueue<WorkItem>,
    background: &BackgroundModel,
) -> Result<u64, PipelineError> {
    let mut pushed: u64 = 0;
    while let Some(frame) = source.next_frame()? {
        let seq = pushed + 1;
        if !background.accepts(&frame) {
            let (rows, cols) = background.resolution();
            return Err(PipelineError::ResolutionMismatch {
                seq,
                rows,
                cols,
                got_rows: frame.rows(),
                got_cols: frame.cols(),
                got_channels: frame.channels(),
            });
        }

        let accepted = queue.push(WorkItem { seq, frame });
        debug_assert!(accepted, "work queue closed while the producer was running");
        pushed = seq;
        if pushed % 100 == 0 {
            debug!(pushed, queued = queue.size(), "frames queued");
        }
    }
    Ok(pushed)
}

/// Join every worker, even if some of them panicked.
fn join_workers(
    handles: Vec<JoinHandle<WorkerSummary>>,
) -> Result<Vec<WorkerSummary>, PipelineError> {
    let mut summaries = Vec::with_capacity(handles.len());
    let mut panicked = 0;
    for handle in handles {
        let name = handle.thread().name().unwrap_or("worker").to_string();
        match handle.join() {
            Ok(summary) => summaries.push(summary),
            Err(_) => {
                error!(thread = name, "worker thread panicked");
                panicked += 1;
            }
        }
    }
    if panicked > 0 {
        return Err(PipelineError::WorkerPanicked(panicked));
    }
    Ok(summaries)
}
