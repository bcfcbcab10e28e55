//! Job creation and lookup.

use std::sync::Arc;

use framechain_core::error::CoreError;
use framechain_core::generation;
use framechain_core::types::{AssetId, JobId};
use framechain_db::models::job::{GenerationJob, JobProgress, NewGenerationJob};
use framechain_db::repositories::{AssetCatalog, GenerationStore};
use serde::{Deserialize, Serialize};

/// Request to create a job from a script and one of its thumbnails.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateJob {
    pub script_id: AssetId,
    pub thumbnail_id: AssetId,
    /// Defaults to the script's duration.
    #[serde(default)]
    pub total_duration_secs: Option<u32>,
    /// Defaults to the configured maximum.
    #[serde(default)]
    pub max_segment_secs: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedJob {
    pub job_id: JobId,
    pub total_segments: u32,
}

pub struct JobCoordinator {
    store: Arc<dyn GenerationStore>,
    catalog: Arc<dyn AssetCatalog>,
    max_segment_secs: u32,
}

impl JobCoordinator {
    pub fn new(
        store: Arc<dyn GenerationStore>,
        catalog: Arc<dyn AssetCatalog>,
        max_segment_secs: u32,
    ) -> Self {
        Self {
            store,
            catalog,
            max_segment_secs,
        }
    }

    /// Resolve the script and thumbnail, size the job, and store it as
    /// `pending`.
    pub async fn create_job(&self, input: CreateJob) -> Result<CreatedJob, CoreError> {
        let script = self.catalog.script(input.script_id).await?;
        let thumbnail = self.catalog.thumbnail(input.thumbnail_id).await?;
        if thumbnail.script_id != script.id {
            return Err(CoreError::Validation(format!(
                "thumbnail {} does not belong to script {}",
                thumbnail.id, script.id
            )));
        }

        let total_duration_secs = input.total_duration_secs.unwrap_or(script.duration_secs);
        let max_segment_secs = input.max_segment_secs.unwrap_or(self.max_segment_secs);
        let total_segments = generation::total_segments(total_duration_secs, max_segment_secs)?;

        let job = GenerationJob::new(NewGenerationJob {
            script_id: script.id,
            thumbnail_id: thumbnail.id,
            seed_image_url: thumbnail.url,
            prompt_text: script.content,
            total_duration_secs,
            max_segment_secs,
            total_segments,
        });
        let job_id = job.id;
        self.store.put(job).await?;

        tracing::info!(
            job_id = %job_id,
            script_id = %script.id,
            total_duration_secs,
            total_segments,
            "Generation job created",
        );
        Ok(CreatedJob {
            job_id,
            total_segments,
        })
    }

    pub async fn get_job(&self, job_id: JobId) -> Result<GenerationJob, CoreError> {
        Ok(self.store.get(job_id).await?)
    }

    /// All jobs, newest first.
    pub async fn list_jobs(&self) -> Result<Vec<GenerationJob>, CoreError> {
        Ok(self.store.list().await?)
    }

    pub async fn progress(&self, job_id: JobId) -> Result<JobProgress, CoreError> {
        Ok(self.get_job(job_id).await?.progress())
    }
}
