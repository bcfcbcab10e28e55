//! Script and thumbnail catalog.

use std::collections::HashMap;

use framechain_core::types::AssetId;
use sqlx::{FromRow, PgPool};
use tokio::sync::RwLock;

use super::pg_store::to_i32;
use crate::error::StoreError;
use crate::models::catalog::{NewScript, NewThumbnail, ScriptRecord, ThumbnailRecord};

/// Registry of the scripts and thumbnails jobs are created from.
#[async_trait::async_trait]
pub trait AssetCatalog: Send + Sync {
    async fn register_script(&self, input: NewScript) -> Result<ScriptRecord, StoreError>;

    /// Register a thumbnail. The referenced script must already exist.
    async fn register_thumbnail(&self, input: NewThumbnail)
        -> Result<ThumbnailRecord, StoreError>;

    async fn script(&self, id: AssetId) -> Result<ScriptRecord, StoreError>;

    async fn thumbnail(&self, id: AssetId) -> Result<ThumbnailRecord, StoreError>;
}

fn script_not_found(id: AssetId) -> StoreError {
    StoreError::NotFound { entity: "Script", id }
}

fn thumbnail_not_found(id: AssetId) -> StoreError {
    StoreError::NotFound {
        entity: "Thumbnail",
        id,
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryAssetCatalog {
    scripts: RwLock<HashMap<AssetId, ScriptRecord>>,
    thumbnails: RwLock<HashMap<AssetId, ThumbnailRecord>>,
}

impl InMemoryAssetCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl AssetCatalog for InMemoryAssetCatalog {
    async fn register_script(&self, input: NewScript) -> Result<ScriptRecord, StoreError> {
        let record = ScriptRecord {
            id: uuid::Uuid::new_v4(),
            topic: input.topic,
            content: input.content,
            duration_secs: input.duration_secs,
            created_at: chrono::Utc::now(),
        };
        self.scripts.write().await.insert(record.id, record.clone());
        Ok(record)
    }

    async fn register_thumbnail(
        &self,
        input: NewThumbnail,
    ) -> Result<ThumbnailRecord, StoreError> {
        if !self.scripts.read().await.contains_key(&input.script_id) {
            return Err(script_not_found(input.script_id));
        }
        let record = ThumbnailRecord {
            id: uuid::Uuid::new_v4(),
            script_id: input.script_id,
            url: input.url,
            created_at: chrono::Utc::now(),
        };
        self.thumbnails
            .write()
            .await
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn script(&self, id: AssetId) -> Result<ScriptRecord, StoreError> {
        self.scripts
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| script_not_found(id))
    }

    async fn thumbnail(&self, id: AssetId) -> Result<ThumbnailRecord, StoreError> {
        self.thumbnails
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| thumbnail_not_found(id))
    }
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

const SCRIPT_COLUMNS: &str = "id, topic, content, duration_secs, created_at";
const THUMBNAIL_COLUMNS: &str = "id, script_id, url, created_at";

#[derive(FromRow)]
struct ScriptRow {
    id: AssetId,
    topic: Option<String>,
    content: String,
    duration_secs: i32,
    created_at: framechain_core::types::Timestamp,
}

impl TryFrom<ScriptRow> for ScriptRecord {
    type Error = StoreError;

    fn try_from(row: ScriptRow) -> Result<Self, Self::Error> {
        let duration_secs = u32::try_from(row.duration_secs).map_err(|_| {
            StoreError::Corrupt(format!("negative duration_secs on script {}", row.id))
        })?;
        Ok(Self {
            id: row.id,
            topic: row.topic,
            content: row.content,
            duration_secs,
            created_at: row.created_at,
        })
    }
}

pub struct PgAssetCatalog {
    pool: PgPool,
}

impl PgAssetCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AssetCatalog for PgAssetCatalog {
    async fn register_script(&self, input: NewScript) -> Result<ScriptRecord, StoreError> {
        let query = format!(
            "INSERT INTO scripts (id, topic, content, duration_secs) \
             VALUES ($1, $2, $3, $4) RETURNING {SCRIPT_COLUMNS}"
        );
        sqlx::query_as::<_, ScriptRow>(&query)
            .bind(uuid::Uuid::new_v4())
            .bind(&input.topic)
            .bind(&input.content)
            .bind(to_i32(input.duration_secs, "duration_secs")?)
            .fetch_one(&self.pool)
            .await?
            .try_into()
    }

    async fn register_thumbnail(
        &self,
        input: NewThumbnail,
    ) -> Result<ThumbnailRecord, StoreError> {
        // Check first so a missing script reads as NotFound rather than an
        // FK violation.
        self.script(input.script_id).await?;

        let query = format!(
            "INSERT INTO thumbnails (id, script_id, url) \
             VALUES ($1, $2, $3) RETURNING {THUMBNAIL_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, ThumbnailRecord>(&query)
            .bind(uuid::Uuid::new_v4())
            .bind(input.script_id)
            .bind(&input.url)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn script(&self, id: AssetId) -> Result<ScriptRecord, StoreError> {
        let query = format!("SELECT {SCRIPT_COLUMNS} FROM scripts WHERE id = $1");
        sqlx::query_as::<_, ScriptRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| script_not_found(id))?
            .try_into()
    }

    async fn thumbnail(&self, id: AssetId) -> Result<ThumbnailRecord, StoreError> {
        let query = format!("SELECT {THUMBNAIL_COLUMNS} FROM thumbnails WHERE id = $1");
        sqlx::query_as::<_, ThumbnailRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| thumbnail_not_found(id))
    }
}
