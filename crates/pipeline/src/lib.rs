//! Chained segment generation.
//!
//! A job's video is produced as a sequence of short clips. Each clip is
//! generated by a remote task seeded with the last frame of the clip before
//! it; [`orchestrator`] runs one clip, [`driver`] runs them all in order.

pub mod config;
pub mod coordinator;
pub mod driver;
pub mod frames;
pub mod locks;
pub mod orchestrator;
pub mod poll;
pub mod testing;

pub use config::PipelineConfig;
pub use coordinator::{CreateJob, CreatedJob, JobCoordinator};
pub use driver::{GenerationDriver, RunRegistry};
pub use frames::{FfmpegFrameExtractor, FrameError, FrameExtractor};
pub use orchestrator::SegmentOrchestrator;
pub use poll::PollPolicy;
