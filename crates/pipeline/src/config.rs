use std::path::PathBuf;

use framechain_core::ffmpeg::DEFAULT_LAST_FRAME_RATIO;
use framechain_core::generation::DEFAULT_MAX_SEGMENT_SECS;

use crate::poll::PollPolicy;

/// Settings shared by the coordinator, orchestrator and frame extractor.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Longest clip the provider is asked for.
    pub max_segment_secs: u32,
    pub poll: PollPolicy,
    /// Fraction of the clip duration the seed frame is sampled at.
    pub frame_sample_ratio: f64,
    /// Parent of per-extraction scratch directories; system temp if unset.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_segment_secs: DEFAULT_MAX_SEGMENT_SECS,
            poll: PollPolicy::default(),
            frame_sample_ratio: DEFAULT_LAST_FRAME_RATIO,
            scratch_dir: None,
        }
    }
}
