//! In-memory [`GenerationStore`] backing.
//!
//! A single `RwLock` guards the whole map, so each trait method is atomic
//! with respect to every other.

use std::collections::HashMap;

use framechain_core::types::{JobId, SegmentIndex};
use tokio::sync::RwLock;

use super::generation_store::{GenerationStore, SegmentWrite};
use crate::error::StoreError;
use crate::models::job::{GenerationJob, SegmentResult};
use crate::models::status::JobStatus;

const ENTITY: &str = "GenerationJob";

#[derive(Default)]
pub struct InMemoryGenerationStore {
    jobs: RwLock<HashMap<JobId, GenerationJob>>,
}

impl InMemoryGenerationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(id: JobId) -> StoreError {
    StoreError::NotFound { entity: ENTITY, id }
}

#[async_trait::async_trait]
impl GenerationStore for InMemoryGenerationStore {
    async fn put(&self, job: GenerationJob) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::Duplicate {
                entity: ENTITY,
                id: job.id,
            });
        }
        jobs.insert(job.id, job);
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<GenerationJob, StoreError> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn list(&self) -> Result<Vec<GenerationJob>, StoreError> {
        let mut jobs: Vec<GenerationJob> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn mark_in_flight(
        &self,
        id: JobId,
        index: SegmentIndex,
    ) -> Result<GenerationJob, StoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or_else(|| not_found(id))?;
        if !job.contains_index(index) {
            return Err(StoreError::InvalidSegmentIndex {
                index,
                total: job.total_segments,
            });
        }

        if job.status == JobStatus::Pending {
            job.status = JobStatus::Running;
        }
        job.current_segment_index = Some(job.current_segment_index.map_or(index, |c| c.max(index)));
        job.updated_at = chrono::Utc::now();
        Ok(job.clone())
    }

    async fn update_segment(
        &self,
        id: JobId,
        index: SegmentIndex,
        result: SegmentResult,
    ) -> Result<SegmentWrite, StoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or_else(|| not_found(id))?;
        let total = job.total_segments;
        let slot = job
            .segments
            .get_mut(index as usize)
            .ok_or(StoreError::InvalidSegmentIndex { index, total })?;

        if let Some(existing) = slot {
            return Ok(SegmentWrite::AlreadyPopulated(existing.clone()));
        }
        *slot = Some(result);

        job.current_segment_index = Some(job.current_segment_index.map_or(index, |c| c.max(index)));
        if job.status != JobStatus::Failed && job.all_segments_complete() {
            job.status = JobStatus::Succeeded;
        } else if job.status == JobStatus::Pending {
            job.status = JobStatus::Running;
        }
        job.updated_at = chrono::Utc::now();
        Ok(SegmentWrite::Written(job.clone()))
    }

    async fn mark_failed(&self, id: JobId, message: &str) -> Result<GenerationJob, StoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or_else(|| not_found(id))?;
        if job.status != JobStatus::Succeeded && job.status != JobStatus::Failed {
            job.status = JobStatus::Failed;
            job.failure_message = Some(message.to_string());
            job.updated_at = chrono::Utc::now();
        }
        Ok(job.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;

    use super::*;
    use crate::models::job::tests::{new_job, result};

    #[tokio::test]
    async fn put_and_get_round_trip() {
        let store = InMemoryGenerationStore::new();
        let job = new_job(25, 10);
        store.put(job.clone()).await.unwrap();

        assert_eq!(store.get(job.id).await.unwrap(), job);
    }

    #[tokio::test]
    async fn put_rejects_duplicate_id() {
        let store = InMemoryGenerationStore::new();
        let job = new_job(25, 10);
        store.put(job.clone()).await.unwrap();

        assert_matches!(store.put(job).await, Err(StoreError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn get_missing_job_is_not_found() {
        let store = InMemoryGenerationStore::new();
        assert_matches!(
            store.get(uuid::Uuid::new_v4()).await,
            Err(StoreError::NotFound { entity: "GenerationJob", .. })
        );
    }

    #[tokio::test]
    async fn mark_in_flight_starts_running_and_advances_index() {
        let store = InMemoryGenerationStore::new();
        let job = new_job(25, 10);
        store.put(job.clone()).await.unwrap();

        let job = store.mark_in_flight(job.id, 1).await.unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.current_segment_index, Some(1));

        // Never moves backwards.
        let job = store.mark_in_flight(job.id, 0).await.unwrap();
        assert_eq!(job.current_segment_index, Some(1));
    }

    #[tokio::test]
    async fn update_segment_is_write_once() {
        let store = InMemoryGenerationStore::new();
        let job = new_job(25, 10);
        store.put(job.clone()).await.unwrap();

        let first = result(0);
        assert_matches!(
            store.update_segment(job.id, 0, first.clone()).await.unwrap(),
            SegmentWrite::Written(_)
        );

        let mut second = result(0);
        second.video_url = "https://video.test/other.mp4".into();
        let write = store.update_segment(job.id, 0, second).await.unwrap();
        assert_eq!(write, SegmentWrite::AlreadyPopulated(first.clone()));

        let stored = store.get(job.id).await.unwrap();
        assert_eq!(stored.segment(0), Some(&first));
    }

    #[tokio::test]
    async fn filling_every_slot_succeeds_the_job() {
        let store = InMemoryGenerationStore::new();
        let job = new_job(25, 10);
        store.put(job.clone()).await.unwrap();

        for index in 0..3 {
            let write = store.update_segment(job.id, index, result(index)).await.unwrap();
            let SegmentWrite::Written(updated) = write else {
                panic!("slot {index} should have been written");
            };
            let expected = if index == 2 {
                JobStatus::Succeeded
            } else {
                JobStatus::Running
            };
            assert_eq!(updated.status, expected);
            assert_eq!(updated.current_segment_index, Some(index));
        }
    }

    #[tokio::test]
    async fn update_segment_out_of_range() {
        let store = InMemoryGenerationStore::new();
        let job = new_job(25, 10);
        store.put(job.clone()).await.unwrap();

        assert_matches!(
            store.update_segment(job.id, 3, result(3)).await,
            Err(StoreError::InvalidSegmentIndex { index: 3, total: 3 })
        );
    }

    #[tokio::test]
    async fn failed_job_stays_failed_when_last_slot_lands() {
        let store = InMemoryGenerationStore::new();
        let job = new_job(10, 10);
        store.put(job.clone()).await.unwrap();

        store.mark_failed(job.id, "boom").await.unwrap();
        let write = store.update_segment(job.id, 0, result(0)).await.unwrap();
        let SegmentWrite::Written(updated) = write else {
            panic!("slot should have been written");
        };
        assert_eq!(updated.status, JobStatus::Failed);
        assert_eq!(updated.failure_message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn mark_failed_keeps_first_message() {
        let store = InMemoryGenerationStore::new();
        let job = new_job(25, 10);
        store.put(job.clone()).await.unwrap();

        store.mark_failed(job.id, "first").await.unwrap();
        let job = store.mark_failed(job.id, "second").await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure_message.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn concurrent_first_writes_keep_exactly_one_result() {
        let store = Arc::new(InMemoryGenerationStore::new());
        let job = new_job(25, 10);
        store.put(job.clone()).await.unwrap();

        let writes = futures::future::join_all((0..8).map(|n| {
            let store = Arc::clone(&store);
            let mut candidate = result(1);
            candidate.task_id = format!("task-{n}");
            async move { store.update_segment(job.id, 1, candidate).await.unwrap() }
        }))
        .await;

        let written = writes
            .iter()
            .filter(|w| matches!(w, SegmentWrite::Written(_)))
            .count();
        assert_eq!(written, 1);

        let stored = store.get(job.id).await.unwrap();
        let winner = stored.segment(1).unwrap();
        for write in writes {
            if let SegmentWrite::AlreadyPopulated(existing) = write {
                assert_eq!(&existing, winner);
            }
        }
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = InMemoryGenerationStore::new();
        let mut older = new_job(10, 10);
        older.created_at -= chrono::Duration::seconds(60);
        let newer = new_job(10, 10);
        store.put(older.clone()).await.unwrap();
        store.put(newer.clone()).await.unwrap();

        let ids: Vec<_> = store.list().await.unwrap().into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }
}
