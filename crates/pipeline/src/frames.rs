//! Last-frame extraction for finished segments.
//!
//! The frame sampled near the end of segment `i` becomes the seed image of
//! segment `i + 1`, so it must be stored somewhere the provider can fetch it.

use std::path::PathBuf;
use std::sync::Arc;

use framechain_core::ffmpeg::{self, FfmpegError};
use framechain_core::storage::{ObjectStore, StorageError, JPEG_CONTENT_TYPE};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("video download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("video download returned HTTP {status}")]
    DownloadStatus { status: u16 },

    #[error("scratch file error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Ffmpeg(#[from] FfmpegError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Produces a still image from the end of a video.
#[async_trait::async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Extract the last frame of `video_url`, store it under `key`, and
    /// return its public URL.
    async fn extract_last_frame(&self, video_url: &str, key: &str) -> Result<String, FrameError>;
}

/// [`FrameExtractor`] backed by the ffmpeg/ffprobe binaries.
///
/// Each call downloads the video into its own scratch directory, which is
/// removed when the call returns, successful or not.
pub struct FfmpegFrameExtractor {
    http: reqwest::Client,
    store: Arc<dyn ObjectStore>,
    sample_ratio: f64,
    scratch_dir: Option<PathBuf>,
}

impl FfmpegFrameExtractor {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            store,
            sample_ratio: ffmpeg::DEFAULT_LAST_FRAME_RATIO,
            scratch_dir: None,
        }
    }

    /// Fraction of the clip duration to sample at (default 0.99).
    pub fn with_sample_ratio(mut self, ratio: f64) -> Self {
        self.sample_ratio = ratio;
        self
    }

    /// Parent directory for per-call scratch directories. Defaults to the
    /// system temp dir.
    pub fn with_scratch_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.scratch_dir = dir;
        self
    }

    fn scratch(&self) -> std::io::Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("framechain-");
        match &self.scratch_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                builder.tempdir_in(dir)
            }
            None => builder.tempdir(),
        }
    }

    async fn download(&self, url: &str, path: &std::path::Path) -> Result<u64, FrameError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FrameError::DownloadStatus {
                status: status.as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

#[async_trait::async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn extract_last_frame(&self, video_url: &str, key: &str) -> Result<String, FrameError> {
        let scratch = self.scratch()?;
        let video_path = scratch.path().join("segment.mp4");
        let frame_path = scratch.path().join("last_frame.jpg");

        let bytes = self.download(video_url, &video_path).await?;
        tracing::debug!(video_url, bytes, "Downloaded segment video");

        let timestamp = ffmpeg::extract_last_frame(&video_path, &frame_path, self.sample_ratio).await?;
        let (width, height) = ffmpeg::verify_frame_image(&frame_path)?;

        let data = tokio::fs::read(&frame_path).await?;
        let url = self.store.put(key, data, JPEG_CONTENT_TYPE).await?;
        tracing::info!(key, timestamp, width, height, "Extracted last frame");
        Ok(url)
    }
}
