//! Generation of a single segment: submit, poll, extract, record.
//!
//! [`SegmentOrchestrator::generate_segment`] handles exactly one
//! `(job, index)` per call and returns the stored result. Sequencing
//! across segments belongs to the caller (see
//! [`GenerationDriver`](crate::driver::GenerationDriver)).

use std::sync::Arc;

use framechain_core::error::CoreError;
use framechain_core::generation;
use framechain_core::storage::frame_key;
use framechain_core::types::{JobId, SegmentIndex};
use framechain_db::models::job::{GenerationJob, SegmentResult};
use framechain_db::models::status::JobStatus;
use framechain_db::repositories::{GenerationStore, SegmentWrite};
use framechain_provider::{SegmentRequest, TaskClient};
use tokio_util::sync::CancellationToken;

use crate::frames::FrameExtractor;
use crate::locks::SlotLocks;
use crate::poll::{wait_for_task, PollError, PollPolicy};

pub struct SegmentOrchestrator {
    store: Arc<dyn GenerationStore>,
    client: Arc<dyn TaskClient>,
    frames: Arc<dyn FrameExtractor>,
    poll: PollPolicy,
    locks: SlotLocks,
}

impl SegmentOrchestrator {
    pub fn new(
        store: Arc<dyn GenerationStore>,
        client: Arc<dyn TaskClient>,
        frames: Arc<dyn FrameExtractor>,
        poll: PollPolicy,
    ) -> Self {
        Self {
            store,
            client,
            frames,
            poll,
            locks: SlotLocks::new(),
        }
    }

    /// Generate segment `index` of `job_id` from `seed_image_url`.
    ///
    /// A slot that is already populated is returned as stored without
    /// contacting the provider. Otherwise the seed must be the job's seed
    /// image (index 0) or the frame of segment `index - 1`.
    ///
    /// A provider-side failure marks the job `failed`. Timeouts,
    /// cancellation, an unreachable provider and frame extraction errors
    /// leave the job as it was so the segment can be retried.
    pub async fn generate_segment(
        &self,
        job_id: JobId,
        index: SegmentIndex,
        seed_image_url: &str,
        cancel: &CancellationToken,
    ) -> Result<SegmentResult, CoreError> {
        let job = self.store.get(job_id).await?;
        if let Some(existing) = Self::precheck(&job, index, seed_image_url)? {
            return Ok(existing);
        }

        let _slot = self.locks.acquire(job_id, index).await;

        // Another caller may have filled the slot or failed the job while we waited.
        let job = self.store.get(job_id).await?;
        if let Some(existing) = Self::precheck(&job, index, seed_image_url)? {
            tracing::debug!(job_id = %job_id, segment_index = index, "Slot filled while waiting");
            return Ok(existing);
        }

        let duration_secs =
            generation::segment_duration(job.total_duration_secs, job.max_segment_secs, index)?;
        let request = SegmentRequest {
            prompt: generation::scene_prompt(index, &job.prompt_text),
            seed_image_url: seed_image_url.to_string(),
            duration_secs,
        };

        let task_id = match self.client.submit(&request).await {
            Ok(task_id) => task_id,
            Err(e) => {
                let message = e.to_string();
                tracing::error!(job_id = %job_id, segment_index = index, error = %message, "Segment submission failed");
                return Err(self.fail_job(job_id, index, message).await);
            }
        };
        if let Err(e) = self.store.mark_in_flight(job_id, index).await {
            tracing::error!(job_id = %job_id, segment_index = index, task_id = %task_id, error = %e, "Failed to record submitted segment");
            self.cancel_remote(&task_id).await;
            return Err(e.into());
        }
        tracing::info!(
            job_id = %job_id,
            segment_index = index,
            task_id = %task_id,
            duration_secs,
            "Segment submitted",
        );

        let video_url = match wait_for_task(self.client.as_ref(), &task_id, &self.poll, cancel).await
        {
            Ok(url) => url,
            Err(e) => return Err(self.handle_poll_error(job_id, index, &task_id, e).await),
        };
        tracing::info!(job_id = %job_id, segment_index = index, task_id = %task_id, "Segment video ready");

        let frame_url = self
            .frames
            .extract_last_frame(&video_url, &frame_key(job_id, index))
            .await
            .map_err(|e| {
                tracing::error!(job_id = %job_id, segment_index = index, error = %e, "Frame extraction failed");
                CoreError::FrameExtraction(e.to_string())
            })?;

        let result = SegmentResult {
            video_url,
            frame_url,
            task_id,
            duration_secs,
            completed_at: chrono::Utc::now(),
        };

        match self.store.update_segment(job_id, index, result.clone()).await? {
            SegmentWrite::Written(job) => {
                tracing::info!(
                    job_id = %job_id,
                    segment_index = index,
                    completed = job.completed_segments(),
                    total = job.total_segments,
                    "Segment stored",
                );
                if job.status == JobStatus::Succeeded {
                    tracing::info!(job_id = %job_id, "Job succeeded");
                }
                Ok(result)
            }
            SegmentWrite::AlreadyPopulated(existing) => Ok(existing),
        }
    }

    /// Checks that run before any provider work, in order: index range,
    /// already-populated slot, failed job, seed chain.
    fn precheck(
        job: &GenerationJob,
        index: SegmentIndex,
        seed_image_url: &str,
    ) -> Result<Option<SegmentResult>, CoreError> {
        if !job.contains_index(index) {
            return Err(CoreError::InvalidSegmentIndex {
                index,
                total: job.total_segments,
            });
        }
        if let Some(existing) = job.segment(index) {
            return Ok(Some(existing.clone()));
        }
        if job.status == JobStatus::Failed {
            return Err(CoreError::JobFailed(
                job.failure_message
                    .clone()
                    .unwrap_or_else(|| job.id.to_string()),
            ));
        }

        let Some(expected) = job.seed_for(index) else {
            return Err(CoreError::PreviousSegmentIncomplete {
                index,
                previous: index - 1,
            });
        };
        if expected != seed_image_url {
            return Err(CoreError::SeedMismatch {
                index,
                expected: expected.to_string(),
                actual: seed_image_url.to_string(),
            });
        }
        Ok(None)
    }

    async fn handle_poll_error(
        &self,
        job_id: JobId,
        index: SegmentIndex,
        task_id: &str,
        error: PollError,
    ) -> CoreError {
        match error {
            PollError::Failed(message) => {
                tracing::error!(job_id = %job_id, segment_index = index, task_id, error = %message, "Segment task failed");
                self.fail_job(job_id, index, message).await
            }
            PollError::MissingVideoUrl => {
                tracing::error!(job_id = %job_id, segment_index = index, task_id, "Task succeeded without a video");
                self.fail_job(job_id, index, error.to_string()).await
            }
            PollError::Timeout { waited } => {
                tracing::warn!(job_id = %job_id, segment_index = index, task_id, waited_secs = waited.as_secs(), "Segment timed out");
                self.cancel_remote(task_id).await;
                CoreError::Timeout {
                    index,
                    task_id: task_id.to_string(),
                    waited_secs: waited.as_secs(),
                }
            }
            PollError::Cancelled => {
                tracing::info!(job_id = %job_id, segment_index = index, task_id, "Segment cancelled");
                self.cancel_remote(task_id).await;
                CoreError::Cancelled {
                    index,
                    task_id: task_id.to_string(),
                }
            }
            PollError::Unavailable { .. } => {
                self.cancel_remote(task_id).await;
                CoreError::TaskUnavailable {
                    index,
                    task_id: task_id.to_string(),
                    message: error.to_string(),
                }
            }
        }
    }

    /// Mark the job failed and build the error returned to the caller.
    async fn fail_job(&self, job_id: JobId, index: SegmentIndex, message: String) -> CoreError {
        match self.store.mark_failed(job_id, &message).await {
            Ok(_) => tracing::warn!(job_id = %job_id, segment_index = index, "Job failed"),
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to record job failure");
            }
        }
        CoreError::SegmentGenerationFailed { index, message }
    }

    async fn cancel_remote(&self, task_id: &str) {
        if let Err(e) = self.client.cancel(task_id).await {
            tracing::warn!(task_id, error = %e, "Remote task cancel failed");
        }
    }
}
