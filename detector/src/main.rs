mod cli;

use clap::Parser;
use cli::Args;
use motion_common::config::Config;
use motion_detector::Pipeline;
use tracing::{error, info};

fn main() {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config from {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    args.apply(&mut config);
    if let Err(e) = config.validate() {
        eprintln!("{e}");
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        video = %args.video.display(),
        workers = config.pipeline.workers,
        queue_capacity = config.pipeline.queue_capacity,
        "starting motion detector"
    );

    let mut source = match motion_source::open(&args.video) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to open video");
            std::process::exit(1);
        }
    };

    let pipeline = Pipeline::new(config);
    let report = match pipeline.run(&mut source) {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "motion detection failed");
            std::process::exit(1);
        }
    };

    if args.json {
        match report.to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => {
                error!(error = %e, "failed to serialize report");
                std::process::exit(1);
            }
        }
    } else {
        println!("{report}");
    }
}
