//! Caller-level sequencing of a whole job.
//!
//! [`GenerationDriver::run`] feeds each segment's frame into the next
//! segment until every slot is filled. [`RunRegistry`] runs drivers in the
//! background, one per job, each with its own cancellation token.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use framechain_core::error::CoreError;
use framechain_core::types::JobId;
use framechain_db::models::job::GenerationJob;
use framechain_db::repositories::GenerationStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::orchestrator::SegmentOrchestrator;

pub struct GenerationDriver {
    store: Arc<dyn GenerationStore>,
    orchestrator: Arc<SegmentOrchestrator>,
}

impl GenerationDriver {
    pub fn new(store: Arc<dyn GenerationStore>, orchestrator: Arc<SegmentOrchestrator>) -> Self {
        Self {
            store,
            orchestrator,
        }
    }

    /// Generate every remaining segment of `job_id` in order, starting at
    /// the first empty slot. Returns the job as stored when the run ends.
    ///
    /// Stops at the first segment error. If `cancel` fires between
    /// segments the partially complete job is returned.
    pub async fn run(
        &self,
        job_id: JobId,
        cancel: &CancellationToken,
    ) -> Result<GenerationJob, CoreError> {
        let mut job = self.store.get(job_id).await?;

        while let Some(index) = job.next_pending_index() {
            if cancel.is_cancelled() {
                tracing::info!(job_id = %job_id, segment_index = index, "Run cancelled");
                return Ok(job);
            }

            let seed = job
                .seed_for(index)
                .ok_or(CoreError::PreviousSegmentIncomplete {
                    index,
                    previous: index.saturating_sub(1),
                })?
                .to_string();
            self.orchestrator
                .generate_segment(job_id, index, &seed, cancel)
                .await?;
            job = self.store.get(job_id).await?;
        }

        Ok(job)
    }
}

/// Background driver runs, at most one per job.
pub struct RunRegistry {
    driver: Arc<GenerationDriver>,
    /// Parent of every run token; cancelling it stops all runs.
    shutdown: CancellationToken,
    runs: Mutex<HashMap<JobId, CancellationToken>>,
}

impl RunRegistry {
    pub fn new(driver: Arc<GenerationDriver>, shutdown: CancellationToken) -> Self {
        Self {
            driver,
            shutdown,
            runs: Mutex::new(HashMap::new()),
        }
    }

    fn runs(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, CancellationToken>> {
        self.runs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Spawn a driver run for `job_id`. Fails with `Conflict` if one is
    /// already in progress.
    pub fn start(
        self: &Arc<Self>,
        job_id: JobId,
    ) -> Result<JoinHandle<Result<GenerationJob, CoreError>>, CoreError> {
        let token = self.shutdown.child_token();
        {
            let mut runs = self.runs();
            if runs.contains_key(&job_id) {
                return Err(CoreError::Conflict(format!(
                    "job {job_id} already has a run in progress"
                )));
            }
            runs.insert(job_id, token.clone());
        }

        let registry = Arc::clone(self);
        Ok(tokio::spawn(async move {
            tracing::info!(job_id = %job_id, "Run started");
            let result = registry.driver.run(job_id, &token).await;
            match &result {
                Ok(job) => tracing::info!(
                    job_id = %job_id,
                    status = %job.status,
                    completed = job.completed_segments(),
                    total = job.total_segments,
                    "Run finished",
                ),
                Err(e) => tracing::warn!(job_id = %job_id, error = %e, "Run stopped"),
            }
            registry.runs().remove(&job_id);
            result
        }))
    }

    /// Cancel the run for `job_id`. Returns false if none is in progress.
    pub fn cancel(&self, job_id: JobId) -> bool {
        match self.runs().get(&job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, job_id: JobId) -> bool {
        self.runs().contains_key(&job_id)
    }

    /// Number of runs in progress.
    pub fn active(&self) -> usize {
        self.runs().len()
    }

    /// Cancel every run.
    pub fn cancel_all(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use framechain_core::generation;
    use framechain_db::models::job::NewGenerationJob;
    use framechain_db::models::status::JobStatus;
    use framechain_db::repositories::InMemoryGenerationStore;
    use framechain_provider::TaskSnapshot;

    use super::*;
    use crate::poll::PollPolicy;
    use crate::testing::{FakeFrameExtractor, PollStep, ScriptedTaskClient};

    struct Harness {
        store: Arc<InMemoryGenerationStore>,
        client: Arc<ScriptedTaskClient>,
        driver: Arc<GenerationDriver>,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryGenerationStore::new());
        let client = Arc::new(ScriptedTaskClient::new());
        let orchestrator = Arc::new(SegmentOrchestrator::new(
            store.clone(),
            client.clone(),
            Arc::new(FakeFrameExtractor::new()),
            PollPolicy::default(),
        ));
        let driver = Arc::new(GenerationDriver::new(store.clone(), orchestrator));
        Harness {
            store,
            client,
            driver,
        }
    }

    async fn create_job(store: &InMemoryGenerationStore, total_duration_secs: u32) -> JobId {
        let job = GenerationJob::new(NewGenerationJob {
            script_id: uuid::Uuid::new_v4(),
            thumbnail_id: uuid::Uuid::new_v4(),
            seed_image_url: "https://cdn.test/thumb.jpg".into(),
            prompt_text: "Waves at night".into(),
            total_duration_secs,
            max_segment_secs: 10,
            total_segments: generation::total_segments(total_duration_secs, 10).unwrap(),
        });
        let id = job.id;
        store.put(job).await.unwrap();
        id
    }

    #[tokio::test(start_paused = true)]
    async fn run_chains_every_segment() {
        let h = harness();
        let job_id = create_job(&h.store, 25).await;

        let job = h.driver.run(job_id, &CancellationToken::new()).await.unwrap();

        assert_eq!(job.status, JobStatus::Succeeded);
        let submissions = h.client.submissions();
        assert_eq!(submissions.len(), 3);
        assert_eq!(submissions[0].seed_image_url, "https://cdn.test/thumb.jpg");
        for i in 1..3 {
            assert_eq!(
                submissions[i].seed_image_url,
                job.segments[i - 1].as_ref().unwrap().frame_url
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn run_resumes_from_first_empty_slot() {
        let h = harness();
        let job_id = create_job(&h.store, 25).await;
        h.client.script("task-2", [PollStep::Unavailable]);

        // task-1 succeeds, task-2 is unreachable.
        assert_matches!(
            h.driver.run(job_id, &CancellationToken::new()).await,
            Err(CoreError::TaskUnavailable { index: 1, .. })
        );
        assert_eq!(h.store.get(job_id).await.unwrap().completed_segments(), 1);

        let job = h.driver.run(job_id, &CancellationToken::new()).await.unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(h.client.submissions().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_failed_segment() {
        let h = harness();
        let job_id = create_job(&h.store, 25).await;
        h.client
            .script("task-1", [PollStep::Snapshot(TaskSnapshot::failed("nsfw"))]);

        assert_matches!(
            h.driver.run(job_id, &CancellationToken::new()).await,
            Err(CoreError::SegmentGenerationFailed { index: 0, .. })
        );
        assert_matches!(
            h.driver.run(job_id, &CancellationToken::new()).await,
            Err(CoreError::JobFailed(_))
        );
        assert_eq!(h.client.submissions().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn registry_rejects_second_run_and_cleans_up() {
        let h = harness();
        let job_id = create_job(&h.store, 25).await;
        let registry = Arc::new(RunRegistry::new(h.driver.clone(), CancellationToken::new()));

        let handle = registry.start(job_id).unwrap();
        assert!(registry.is_running(job_id));
        assert_matches!(registry.start(job_id), Err(CoreError::Conflict(_)));

        let job = handle.await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
        assert!(!registry.is_running(job_id));
        assert!(!registry.cancel(job_id));
    }

    #[tokio::test(start_paused = true)]
    async fn registry_cancel_stops_the_run() {
        let h = harness();
        h.client
            .set_default_script([PollStep::Snapshot(TaskSnapshot::running())]);
        let job_id = create_job(&h.store, 25).await;
        let registry = Arc::new(RunRegistry::new(h.driver.clone(), CancellationToken::new()));

        let handle = registry.start(job_id).unwrap();
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert!(registry.cancel(job_id));

        assert_matches!(
            handle.await.unwrap(),
            Err(CoreError::Cancelled { index: 0, .. })
        );
        assert_eq!(h.client.cancelled(), vec!["task-1".to_string()]);
        assert!(!registry.is_running(job_id));
        assert_ne!(h.store.get(job_id).await.unwrap().status, JobStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_stops_every_run() {
        let h = harness();
        h.client
            .set_default_script([PollStep::Snapshot(TaskSnapshot::running())]);
        let a = create_job(&h.store, 10).await;
        let b = create_job(&h.store, 10).await;
        let registry = Arc::new(RunRegistry::new(h.driver.clone(), CancellationToken::new()));

        let ha = registry.start(a).unwrap();
        let hb = registry.start(b).unwrap();
        assert_eq!(registry.active(), 2);
        tokio::time::sleep(Duration::from_secs(7)).await;
        registry.cancel_all();

        assert_matches!(ha.await.unwrap(), Err(CoreError::Cancelled { .. }));
        assert_matches!(hb.await.unwrap(), Err(CoreError::Cancelled { .. }));
        assert_eq!(registry.active(), 0);
    }
}
