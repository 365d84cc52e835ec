use clap::Parser;
use motion_common::config::Config;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "motion-detect")]
#[command(about = "Count video frames that differ from the first (background) frame", long_about = None)]
pub struct Args {
    /// Video to analyse: an .mjpeg/.mjpg file or a directory of images
    pub video: PathBuf,

    /// Number of worker threads processing frames
    pub workers: usize,

    /// Helper threads per grayscale conversion (values <= 0 mean 1)
    #[arg(allow_negative_numbers = true)]
    pub grayscale_workers: Option<i64>,

    /// Helper threads per smoothing pass (values <= 0 mean 1)
    #[arg(allow_negative_numbers = true)]
    pub smooth_workers: Option<i64>,

    /// Helper threads per background comparison (values <= 0 mean 1)
    #[arg(allow_negative_numbers = true)]
    pub diff_workers: Option<i64>,

    /// TOML config file; command-line values take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Minimum per-pixel difference counted as a change
    #[arg(long)]
    pub min_diff: Option<u8>,

    /// Fraction of changed pixels above which a frame shows motion
    #[arg(long)]
    pub perc: Option<f64>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl Args {
    /// Overlay command-line values on a loaded config.
    pub fn apply(&self, config: &mut Config) {
        config.pipeline.workers = self.workers;
        if let Some(n) = self.grayscale_workers {
            config.pipeline.grayscale_workers = n;
        }
        if let Some(n) = self.smooth_workers {
            config.pipeline.smooth_workers = n;
        }
        if let Some(n) = self.diff_workers {
            config.pipeline.diff_workers = n;
        }
        if let Some(min_diff) = self.min_diff {
            config.detection.min_diff = min_diff;
        }
        if let Some(perc) = self.perc {
            config.detection.perc = perc;
        }
    }
}
