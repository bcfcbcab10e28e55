//! The generation store contract.
//!
//! Every backing must make [`GenerationStore::update_segment`] a
//! compare-and-set on the slot: the first write wins and later writes for
//! the same `(job, index)` observe the stored result instead of replacing
//! it.

use framechain_core::types::{JobId, SegmentIndex};

use crate::error::StoreError;
use crate::models::job::{GenerationJob, SegmentResult};

/// Outcome of writing a segment slot.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentWrite {
    /// The slot was empty and now holds the new result. Carries the job as
    /// it stands after the write (index advanced, status possibly flipped
    /// to `Succeeded`).
    Written(GenerationJob),
    /// The slot already held a result; it was left untouched.
    AlreadyPopulated(SegmentResult),
}

/// Keyed storage for [`GenerationJob`] records.
#[async_trait::async_trait]
pub trait GenerationStore: Send + Sync {
    /// Insert a new job. Fails with [`StoreError::Duplicate`] if the id exists.
    async fn put(&self, job: GenerationJob) -> Result<(), StoreError>;

    /// Fetch a job by id.
    async fn get(&self, id: JobId) -> Result<GenerationJob, StoreError>;

    /// All jobs, newest first.
    async fn list(&self) -> Result<Vec<GenerationJob>, StoreError>;

    /// Record that segment `index` has been submitted: `Pending` becomes
    /// `Running` and `current_segment_index` advances to at least `index`.
    /// Terminal jobs keep their status.
    async fn mark_in_flight(
        &self,
        id: JobId,
        index: SegmentIndex,
    ) -> Result<GenerationJob, StoreError>;

    /// Write-once store of a segment result.
    ///
    /// On a first write, advances `current_segment_index` to at least
    /// `index` and sets `Succeeded` when every slot is populated (unless
    /// the job has already `Failed`).
    async fn update_segment(
        &self,
        id: JobId,
        index: SegmentIndex,
        result: SegmentResult,
    ) -> Result<SegmentWrite, StoreError>;

    /// Move a non-succeeded job to `Failed` with a message. Idempotent.
    async fn mark_failed(&self, id: JobId, message: &str) -> Result<GenerationJob, StoreError>;
}
