//! Script and thumbnail records referenced by generation jobs.
//!
//! Scripts and thumbnails are produced elsewhere; the catalog only keeps
//! what job creation needs to resolve them.

use framechain_core::types::{AssetId, Timestamp};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A generated script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptRecord {
    pub id: AssetId,
    pub topic: Option<String>,
    pub content: String,
    /// Intended length of the final video.
    pub duration_secs: u32,
    pub created_at: Timestamp,
}

/// A candidate thumbnail for a script; its URL seeds the first segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ThumbnailRecord {
    pub id: AssetId,
    pub script_id: AssetId,
    pub url: String,
    pub created_at: Timestamp,
}

/// Body for `POST /api/v1/scripts`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewScript {
    #[validate(length(max = 200))]
    pub topic: Option<String>,
    #[validate(length(min = 1, max = 20000))]
    pub content: String,
    #[validate(range(min = 1, max = 3600))]
    pub duration_secs: u32,
}

/// Body for `POST /api/v1/thumbnails`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewThumbnail {
    pub script_id: AssetId,
    #[validate(url)]
    pub url: String,
}
