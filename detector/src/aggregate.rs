use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters shared by every worker.
///
/// Updates use relaxed atomics; the driver reads them only after joining
/// all workers, and the join orders every prior update before the read.
#[derive(Debug, Default)]
pub struct Aggregate {
    motion_frames: AtomicU64,
    frames_processed: AtomicU64,
}

impl Aggregate {
    pub fn record_frame(&self, motion: bool) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
        if motion {
            self.motion_frames.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn motion_frames(&self) -> u64 {
        self.motion_frames.load(Ordering::Relaxed)
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed.load(Ordering::Relaxed)
    }
}

/// Summed per-frame processing time.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct LatencyStats {
    pub total: Duration,
    pub samples: u64,
}

impl LatencyStats {
    pub fn record(&mut self, elapsed: Duration) {
        self.total += elapsed;
        self.samples += 1;
    }

    pub fn merge(&mut self, other: &LatencyStats) {
        self.total += other.total;
        self.samples += other.samples;
    }

    pub fn average(&self) -> Option<Duration> {
        if self.samples == 0 {
            return None;
        }
        let nanos = self.total.as_nanos() / u128::from(self.samples);
        Some(Duration::from_nanos(nanos as u64))
    }
}

/// What one worker did over its lifetime, returned from its thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkerSummary {
    pub frames: u64,
    pub motion_frames: u64,
    pub latency: LatencyStats,
}

impl WorkerSummary {
    /// Combine the summaries of joined workers.
    pub fn merge_all<'a>(summaries: impl IntoIterator<Item = &'a WorkerSummary>) -> WorkerSummary {
        summaries
            .into_iter()
            .fold(WorkerSummary::default(), |mut acc, s| {
                acc.frames += s.frames;
                acc.motion_frames += s.motion_frames;
                acc.latency.merge(&s.latency);
                acc
            })
    }
}
