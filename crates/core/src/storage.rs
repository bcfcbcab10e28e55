//! Object storage boundary and the local filesystem backend.
//!
//! Extracted frames (and any other artifacts) are stored as byte blobs
//! under a caller-chosen key and addressed afterwards by a publicly
//! resolvable URL. [`ObjectStore`] is the seam; [`LocalObjectStore`]
//! writes beneath a root directory that the API serves statically.

use std::path::{Component, Path, PathBuf};

use crate::types::{JobId, SegmentIndex};

/// Content type used for extracted frames.
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Errors from an object storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid object key '{0}'")]
    InvalidKey(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Byte-blob storage addressed by key, returning public URLs.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key`, replacing any existing object, and return
    /// its public URL.
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str)
        -> Result<String, StorageError>;

    /// Read back the object stored under `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Public URL for `key`, whether or not it exists yet.
    fn url_for(&self, key: &str) -> Result<String, StorageError>;
}

// ---------------------------------------------------------------------------
// Key naming
// ---------------------------------------------------------------------------

/// Object key for the last frame of a segment: `frames/{job}_{index}.jpg`.
pub fn frame_key(job_id: JobId, index: SegmentIndex) -> String {
    format!("frames/{job_id}_{index}.jpg")
}

/// Validate a key: relative, `/`-separated, no `.`/`..` components.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let invalid = || StorageError::InvalidKey(key.to_string());
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(invalid());
    }
    let all_normal = Path::new(key)
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !all_normal || key.split('/').any(|part| part.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Local filesystem backend
// ---------------------------------------------------------------------------

/// Stores objects as files under `root`, addressed as `{public_base_url}/{key}`.
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// the first write.
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Root directory objects are written beneath.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait::async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let path = self.path_for(key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(io_error(parent))?;
        }

        // Write to a sibling temp file first, then rename into place.
        let temp_path = path.with_extension("part");
        tokio::fs::write(&temp_path, &data)
            .await
            .map_err(io_error(&temp_path))?;
        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(io_error(&path))?;

        tracing::debug!(key, content_type, size = data.len(), "Stored object");
        self.url_for(key)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                io_error(&path)(source)
            }
        })
    }

    fn url_for(&self, key: &str) -> Result<String, StorageError> {
        validate_key(key)?;
        Ok(format!("{}/{key}", self.public_base_url))
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError {
    let path = path.display().to_string();
    move |source| StorageError::Io { path, source }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
