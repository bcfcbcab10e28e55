//! Generation job records and the per-segment results they accumulate.

use framechain_core::generation;
use framechain_core::types::{AssetId, JobId, SegmentIndex, Timestamp};
use serde::Serialize;

use super::status::JobStatus;

/// Output of one completed segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentResult {
    /// URL of the generated video clip.
    pub video_url: String,
    /// URL of the still extracted near the end of the clip; seeds the next segment.
    pub frame_url: String,
    /// Provider task that produced the clip.
    pub task_id: String,
    pub duration_secs: u32,
    pub completed_at: Timestamp,
}

/// A chained video generation job.
///
/// Identity, references, durations and `total_segments` are fixed at
/// creation. `segments` has exactly `total_segments` slots, each written
/// at most once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationJob {
    pub id: JobId,
    pub script_id: AssetId,
    pub thumbnail_id: AssetId,
    /// Seed image for segment 0 (the thumbnail URL).
    pub seed_image_url: String,
    /// Script text the scene prompts are built from.
    pub prompt_text: String,
    pub status: JobStatus,
    pub total_duration_secs: u32,
    pub max_segment_secs: u32,
    pub total_segments: u32,
    /// Highest segment index that has completed or been submitted.
    pub current_segment_index: Option<SegmentIndex>,
    pub segments: Vec<Option<SegmentResult>>,
    pub failure_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Inputs for a new job, already validated and resolved by the coordinator.
#[derive(Debug, Clone)]
pub struct NewGenerationJob {
    pub script_id: AssetId,
    pub thumbnail_id: AssetId,
    pub seed_image_url: String,
    pub prompt_text: String,
    pub total_duration_secs: u32,
    pub max_segment_secs: u32,
    pub total_segments: u32,
}

impl GenerationJob {
    /// Build a fresh `Pending` job with a new random id and empty slots.
    pub fn new(input: NewGenerationJob) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: uuid::Uuid::new_v4(),
            script_id: input.script_id,
            thumbnail_id: input.thumbnail_id,
            seed_image_url: input.seed_image_url,
            prompt_text: input.prompt_text,
            status: JobStatus::Pending,
            total_duration_secs: input.total_duration_secs,
            max_segment_secs: input.max_segment_secs,
            total_segments: input.total_segments,
            current_segment_index: None,
            segments: vec![None; input.total_segments as usize],
            failure_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The stored result for `index`, if that slot has been written.
    pub fn segment(&self, index: SegmentIndex) -> Option<&SegmentResult> {
        self.segments.get(index as usize).and_then(Option::as_ref)
    }

    /// Whether `index` addresses a slot of this job.
    pub fn contains_index(&self, index: SegmentIndex) -> bool {
        index < self.total_segments
    }

    pub fn completed_segments(&self) -> u32 {
        self.segments.iter().filter(|s| s.is_some()).count() as u32
    }

    /// True once every slot is populated.
    pub fn all_segments_complete(&self) -> bool {
        self.segments.iter().all(Option::is_some)
    }

    /// First index whose slot is still empty.
    pub fn next_pending_index(&self) -> Option<SegmentIndex> {
        self.segments
            .iter()
            .position(Option::is_none)
            .map(|i| i as SegmentIndex)
    }

    /// The seed image segment `index` must be generated from: the job's
    /// seed image for index 0, otherwise the frame of the previous segment
    /// (`None` while that segment is incomplete).
    pub fn seed_for(&self, index: SegmentIndex) -> Option<&str> {
        match index {
            0 => Some(self.seed_image_url.as_str()),
            i => self.segment(i - 1).map(|prev| prev.frame_url.as_str()),
        }
    }

    /// Durations of every segment, in order.
    pub fn segment_durations(&self) -> Vec<u32> {
        generation::segment_durations(self.total_duration_secs, self.max_segment_secs)
            .unwrap_or_default()
    }

    pub fn progress(&self) -> JobProgress {
        let completed = self.completed_segments();
        let percent = if self.total_segments > 0 {
            ((completed as f64 / self.total_segments as f64) * 100.0).round() as u8
        } else {
            0
        };
        JobProgress {
            job_id: self.id,
            status: self.status,
            segments_completed: completed,
            total_segments: self.total_segments,
            percent,
            current_segment_index: self.current_segment_index,
            next_segment_index: self.next_pending_index(),
            segment_durations: self.segment_durations(),
            failure_message: self.failure_message.clone(),
        }
    }
}

/// Progress snapshot for a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobProgress {
    pub job_id: JobId,
    pub status: JobStatus,
    pub segments_completed: u32,
    pub total_segments: u32,
    pub percent: u8,
    pub current_segment_index: Option<SegmentIndex>,
    pub next_segment_index: Option<SegmentIndex>,
    pub segment_durations: Vec<u32>,
    pub failure_message: Option<String>,
}
