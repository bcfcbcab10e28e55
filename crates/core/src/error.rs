use crate::types::SegmentIndex;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Segment index {index} is out of range for a job with {total} segments")]
    InvalidSegmentIndex { index: SegmentIndex, total: u32 },

    #[error("Seed image for segment {index} must be {expected}, got {actual}")]
    SeedMismatch {
        index: SegmentIndex,
        expected: String,
        actual: String,
    },

    #[error("Segment {index} cannot start before segment {previous} has completed")]
    PreviousSegmentIncomplete {
        index: SegmentIndex,
        previous: SegmentIndex,
    },

    #[error("Job has failed and cannot make further progress: {0}")]
    JobFailed(String),

    #[error("Segment {index} generation failed: {message}")]
    SegmentGenerationFailed { index: SegmentIndex, message: String },

    #[error("Segment {index} timed out after {waited_secs}s waiting on task {task_id}")]
    Timeout {
        index: SegmentIndex,
        task_id: String,
        waited_secs: u64,
    },

    #[error("Segment {index} was cancelled while waiting on task {task_id}")]
    Cancelled { index: SegmentIndex, task_id: String },

    #[error("Status of task {task_id} for segment {index} is unavailable: {message}")]
    TaskUnavailable {
        index: SegmentIndex,
        task_id: String,
        message: String,
    },

    #[error("Frame extraction failed: {0}")]
    FrameExtraction(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a [`CoreError::NotFound`] keyed by any displayable id.
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
