use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Thresholds handed to the difference kernel.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DetectionConfig {
    /// A pixel differs when `|frame - background| > min_diff`.
    #[serde(default = "default_min_diff")]
    pub min_diff: u8,
    /// A frame shows motion when more than this fraction of pixels differ.
    #[serde(default = "default_perc")]
    pub perc: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Size of the worker pool.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Helper threads per grayscale conversion. Values <= 0 mean sequential.
    #[serde(default = "default_kernel_workers")]
    pub grayscale_workers: i64,
    /// Helper threads per smoothing pass.
    #[serde(default = "default_kernel_workers")]
    pub smooth_workers: i64,
    /// Helper threads per difference count.
    #[serde(default = "default_kernel_workers")]
    pub diff_workers: i64,
    /// Maximum frames waiting in the work queue; 0 means unbounded.
    #[serde(default)]
    pub queue_capacity: usize,
    #[serde(default = "default_measure_latency")]
    pub measure_latency: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_diff: default_min_diff(),
            perc: default_perc(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            grayscale_workers: default_kernel_workers(),
            smooth_workers: default_kernel_workers(),
            diff_workers: default_kernel_workers(),
            queue_capacity: 0,
            measure_latency: default_measure_latency(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl PipelineConfig {
    /// Per-kernel helper thread counts, with non-positive values mapped to 1.
    pub fn kernel_workers(&self) -> KernelWorkers {
        KernelWorkers {
            grayscale: normalize_degree(self.grayscale_workers),
            smooth: normalize_degree(self.smooth_workers),
            diff: normalize_degree(self.diff_workers),
        }
    }
}

/// Nested parallelism degree for each stage kernel. Always >= 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelWorkers {
    pub grayscale: usize,
    pub smooth: usize,
    pub diff: usize,
}

impl Default for KernelWorkers {
    fn default() -> Self {
        Self {
            grayscale: 1,
            smooth: 1,
            diff: 1,
        }
    }
}

/// Map a user-supplied degree to a thread count: anything below 1 is 1.
pub fn normalize_degree(degree: i64) -> usize {
    if degree <= 1 {
        1
    } else {
        degree as usize
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let perc = self.detection.perc;
        if !(0.0..=1.0).contains(&perc) {
            return Err(ConfigError::Invalid(format!(
                "detection.perc must be within [0, 1], got {perc}"
            )));
        }
        if self.pipeline.workers == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.workers must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_min_diff() -> u8 {
    10
}
fn default_perc() -> f64 {
    0.05
}
fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
fn default_kernel_workers() -> i64 {
    1
}
fn default_measure_latency() -> bool {
    true
}
fn default_log_level() -> String {
    "info".into()
}
