//! Postgres [`GenerationStore`] backing.
//!
//! Jobs live in `generation_jobs`; each populated slot is a row in
//! `generation_segments` keyed by `(job_id, segment_index)`. The primary key
//! makes the slot write-once: inserts use `ON CONFLICT DO NOTHING` and a
//! zero row count means another writer got there first.

use std::collections::HashMap;

use framechain_core::types::{JobId, SegmentIndex, Timestamp};
use sqlx::{FromRow, PgConnection, PgPool};

use super::generation_store::{GenerationStore, SegmentWrite};
use crate::error::StoreError;
use crate::models::job::{GenerationJob, SegmentResult};
use crate::models::status::{JobStatus, StatusId};

const ENTITY: &str = "GenerationJob";

/// Column list for `generation_jobs` queries.
const JOB_COLUMNS: &str = "\
    id, script_id, thumbnail_id, seed_image_url, prompt_text, status_id, \
    total_duration_secs, max_segment_secs, total_segments, \
    current_segment_index, failure_message, created_at, updated_at";

/// Column list for `generation_segments` queries.
const SEGMENT_COLUMNS: &str = "\
    job_id, segment_index, video_url, frame_url, task_id, duration_secs, completed_at";

#[derive(Debug, FromRow)]
struct JobRow {
    id: JobId,
    script_id: uuid::Uuid,
    thumbnail_id: uuid::Uuid,
    seed_image_url: String,
    prompt_text: String,
    status_id: StatusId,
    total_duration_secs: i32,
    max_segment_secs: i32,
    total_segments: i32,
    current_segment_index: Option<i32>,
    failure_message: Option<String>,
    created_at: Timestamp,
    updated_at: Timestamp,
}

#[derive(Debug, FromRow)]
struct SegmentRow {
    job_id: JobId,
    segment_index: i32,
    video_url: String,
    frame_url: String,
    task_id: String,
    duration_secs: i32,
    completed_at: Timestamp,
}

fn to_u32(value: i32, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative {column}: {value}")))
}

/// Narrow a domain value to an `INTEGER` column.
pub(super) fn to_i32(value: u32, column: &'static str) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::OutOfRange { column, value })
}

impl SegmentRow {
    fn into_result(self) -> Result<SegmentResult, StoreError> {
        Ok(SegmentResult {
            video_url: self.video_url,
            frame_url: self.frame_url,
            task_id: self.task_id,
            duration_secs: to_u32(self.duration_secs, "duration_secs")?,
            completed_at: self.completed_at,
        })
    }
}

impl JobRow {
    /// Combine the job row with its segment rows into a domain record.
    fn assemble(self, segment_rows: Vec<SegmentRow>) -> Result<GenerationJob, StoreError> {
        let status = JobStatus::from_id(self.status_id)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown status_id {}", self.status_id)))?;
        let total_segments = to_u32(self.total_segments, "total_segments")?;

        let mut segments = vec![None; total_segments as usize];
        for row in segment_rows {
            let index = to_u32(row.segment_index, "segment_index")? as usize;
            let slot = segments.get_mut(index).ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "segment {index} of job {} exceeds {total_segments} slots",
                    self.id
                ))
            })?;
            *slot = Some(row.into_result()?);
        }

        Ok(GenerationJob {
            id: self.id,
            script_id: self.script_id,
            thumbnail_id: self.thumbnail_id,
            seed_image_url: self.seed_image_url,
            prompt_text: self.prompt_text,
            status,
            total_duration_secs: to_u32(self.total_duration_secs, "total_duration_secs")?,
            max_segment_secs: to_u32(self.max_segment_secs, "max_segment_secs")?,
            total_segments,
            current_segment_index: self
                .current_segment_index
                .map(|i| to_u32(i, "current_segment_index"))
                .transpose()?,
            segments,
            failure_message: self.failure_message,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub struct PgGenerationStore {
    pool: PgPool,
}

impl PgGenerationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch the job row, optionally taking a row lock for the rest of the
    /// transaction.
    async fn fetch_row(
        conn: &mut PgConnection,
        id: JobId,
        for_update: bool,
    ) -> Result<JobRow, StoreError> {
        let lock = if for_update { " FOR UPDATE" } else { "" };
        let query = format!("SELECT {JOB_COLUMNS} FROM generation_jobs WHERE id = $1{lock}");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or(StoreError::NotFound { entity: ENTITY, id })
    }

    async fn fetch_segments(
        conn: &mut PgConnection,
        id: JobId,
    ) -> Result<Vec<SegmentRow>, StoreError> {
        let query = format!(
            "SELECT {SEGMENT_COLUMNS} FROM generation_segments \
             WHERE job_id = $1 ORDER BY segment_index"
        );
        Ok(sqlx::query_as::<_, SegmentRow>(&query)
            .bind(id)
            .fetch_all(conn)
            .await?)
    }

    async fn load(conn: &mut PgConnection, id: JobId) -> Result<GenerationJob, StoreError> {
        let row = Self::fetch_row(&mut *conn, id, false).await?;
        let segments = Self::fetch_segments(conn, id).await?;
        row.assemble(segments)
    }
}

#[async_trait::async_trait]
impl GenerationStore for PgGenerationStore {
    async fn put(&self, job: GenerationJob) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO generation_jobs \
                 (id, script_id, thumbnail_id, seed_image_url, prompt_text, status_id, \
                  total_duration_secs, max_segment_secs, total_segments, \
                  current_segment_index, failure_message, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(job.id)
        .bind(job.script_id)
        .bind(job.thumbnail_id)
        .bind(&job.seed_image_url)
        .bind(&job.prompt_text)
        .bind(job.status.id())
        .bind(to_i32(job.total_duration_secs, "total_duration_secs")?)
        .bind(to_i32(job.max_segment_secs, "max_segment_secs")?)
        .bind(to_i32(job.total_segments, "total_segments")?)
        .bind(
            job.current_segment_index
                .map(|i| to_i32(i, "current_segment_index"))
                .transpose()?,
        )
        .bind(&job.failure_message)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Duplicate {
                entity: ENTITY,
                id: job.id,
            });
        }
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<GenerationJob, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Self::load(&mut conn, id).await
    }

    async fn list(&self) -> Result<Vec<GenerationJob>, StoreError> {
        let query = format!("SELECT {JOB_COLUMNS} FROM generation_jobs ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, JobRow>(&query)
            .fetch_all(&self.pool)
            .await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<JobId> = rows.iter().map(|r| r.id).collect();
        let query = format!(
            "SELECT {SEGMENT_COLUMNS} FROM generation_segments \
             WHERE job_id = ANY($1) ORDER BY job_id, segment_index"
        );
        let segment_rows = sqlx::query_as::<_, SegmentRow>(&query)
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;

        let mut by_job: HashMap<JobId, Vec<SegmentRow>> = HashMap::new();
        for row in segment_rows {
            by_job.entry(row.job_id).or_default().push(row);
        }

        rows.into_iter()
            .map(|row| {
                let segments = by_job.remove(&row.id).unwrap_or_default();
                row.assemble(segments)
            })
            .collect()
    }

    async fn mark_in_flight(
        &self,
        id: JobId,
        index: SegmentIndex,
    ) -> Result<GenerationJob, StoreError> {
        let mut tx = self.pool.begin().await?;
        let row = Self::fetch_row(&mut tx, id, true).await?;
        let total = to_u32(row.total_segments, "total_segments")?;
        if index >= total {
            return Err(StoreError::InvalidSegmentIndex { index, total });
        }

        sqlx::query(
            "UPDATE generation_jobs SET \
                 status_id = CASE WHEN status_id = $3 THEN $4 ELSE status_id END, \
                 current_segment_index = GREATEST(current_segment_index, $2), \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(to_i32(index, "segment_index")?)
        .bind(JobStatus::Pending.id())
        .bind(JobStatus::Running.id())
        .execute(&mut *tx)
        .await?;

        let job = Self::load(&mut tx, id).await?;
        tx.commit().await?;
        Ok(job)
    }

    async fn update_segment(
        &self,
        id: JobId,
        index: SegmentIndex,
        result: SegmentResult,
    ) -> Result<SegmentWrite, StoreError> {
        let mut tx = self.pool.begin().await?;
        let row = Self::fetch_row(&mut tx, id, true).await?;
        let total = to_u32(row.total_segments, "total_segments")?;
        if index >= total {
            return Err(StoreError::InvalidSegmentIndex { index, total });
        }

        let inserted = sqlx::query(
            "INSERT INTO generation_segments \
                 (job_id, segment_index, video_url, frame_url, task_id, duration_secs, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (job_id, segment_index) DO NOTHING",
        )
        .bind(id)
        .bind(to_i32(index, "segment_index")?)
        .bind(&result.video_url)
        .bind(&result.frame_url)
        .bind(&result.task_id)
        .bind(to_i32(result.duration_secs, "duration_secs")?)
        .bind(result.completed_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            let query = format!(
                "SELECT {SEGMENT_COLUMNS} FROM generation_segments \
                 WHERE job_id = $1 AND segment_index = $2"
            );
            let existing = sqlx::query_as::<_, SegmentRow>(&query)
                .bind(id)
                .bind(to_i32(index, "segment_index")?)
                .fetch_one(&mut *tx)
                .await?;
            tx.commit().await?;
            return Ok(SegmentWrite::AlreadyPopulated(existing.into_result()?));
        }

        let (completed,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM generation_segments WHERE job_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        let all_complete = completed >= i64::from(row.total_segments);

        sqlx::query(
            "UPDATE generation_jobs SET \
                 status_id = CASE \
                     WHEN status_id = $3 THEN status_id \
                     WHEN $4 THEN $5 \
                     ELSE $6 END, \
                 current_segment_index = GREATEST(current_segment_index, $2), \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(to_i32(index, "segment_index")?)
        .bind(JobStatus::Failed.id())
        .bind(all_complete)
        .bind(JobStatus::Succeeded.id())
        .bind(JobStatus::Running.id())
        .execute(&mut *tx)
        .await?;

        let job = Self::load(&mut tx, id).await?;
        tx.commit().await?;
        Ok(SegmentWrite::Written(job))
    }

    async fn mark_failed(&self, id: JobId, message: &str) -> Result<GenerationJob, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE generation_jobs SET status_id = $2, failure_message = $3, updated_at = NOW() \
             WHERE id = $1 AND status_id NOT IN ($4, $2)",
        )
        .bind(id)
        .bind(JobStatus::Failed.id())
        .bind(message)
        .bind(JobStatus::Succeeded.id())
        .execute(&mut *tx)
        .await?;

        let job = Self::load(&mut tx, id).await?;
        tx.commit().await?;
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use framechain_core::error::CoreError;

    use super::*;

    #[test]
    fn to_i32_accepts_column_range() {
        assert_eq!(to_i32(0, "duration_secs").unwrap(), 0);
        assert_eq!(to_i32(i32::MAX as u32, "duration_secs").unwrap(), i32::MAX);
    }

    #[test]
    fn oversized_duration_is_a_validation_error() {
        let err = to_i32(i32::MAX as u32 + 1, "total_duration_secs").unwrap_err();
        assert_matches!(
            err,
            StoreError::OutOfRange {
                column: "total_duration_secs",
                ..
            }
        );
        assert_matches!(CoreError::from(err), CoreError::Validation(_));
    }
}
