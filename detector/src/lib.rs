//! Streaming motion detection.
//!
//! Frames from a [`motion_source::FrameSource`] are compared against a fixed
//! background by a pool of worker threads. See [`pipeline`] for the overall
//! flow.

pub mod aggregate;
pub mod background;
pub mod kernels;
pub mod pipeline;
pub mod queue;
pub mod report;
pub mod worker;

pub use pipeline::{Pipeline, PipelineError};
pub use report::RunReport;
