use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Read-only snapshot of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub source: String,
    pub rows: usize,
    pub cols: usize,
    pub workers: usize,
    pub grayscale_workers: usize,
    pub smooth_workers: usize,
    pub diff_workers: usize,
    /// Frames queued after the background frame.
    pub frames_pushed: u64,
    pub frames_processed: u64,
    pub motion_frames: u64,
    /// Mean time a worker spent on one frame.
    pub avg_latency_ms: Option<f64>,
    /// Streaming wall time divided by frames processed.
    pub avg_service_time_ms: Option<f64>,
    pub elapsed_ms: f64,
}

impl RunReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

pub(crate) fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Number of motion frames: {}", self.motion_frames)?;
        writeln!(
            f,
            "Frames processed: {} ({}x{}, {} workers)",
            self.frames_processed, self.cols, self.rows, self.workers
        )?;
        if let Some(latency) = self.avg_latency_ms {
            writeln!(f, "Average frame latency: {latency:.3} ms")?;
        }
        if let Some(service) = self.avg_service_time_ms {
            writeln!(f, "Average service time: {service:.3} ms")?;
        }
        write!(f, "Overall completion time: {:.0} ms", self.elapsed_ms)
    }
}
