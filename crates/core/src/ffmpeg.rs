//! FFmpeg/FFprobe command utilities.
//!
//! Shared by the frame extractor: probe a downloaded segment for its
//! duration, grab one frame near the end as a JPEG, and verify the
//! written image before it is persisted.

use std::path::Path;

use serde::Deserialize;

/// Fraction of the clip duration at which the "last" frame is sampled.
///
/// The true final frame is frequently black or mid-transition, so the
/// sample is taken slightly before the end.
pub const DEFAULT_LAST_FRAME_RATIO: f64 = 0.99;

/// Error type for FFmpeg/FFprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("video file not found: {0}")]
    VideoNotFound(String),

    #[error("video has no usable duration")]
    NoDuration,

    #[error("extracted frame is empty: {0}")]
    EmptyOutput(String),

    #[error("extracted frame is not a readable image: {0}")]
    InvalidImage(String),
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_format -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    pub streams: Vec<FfprobeStream>,
    pub format: FfprobeFormat,
}

/// A single stream from ffprobe output.
#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    pub index: i32,
    pub codec_name: Option<String>,
    pub codec_type: Option<String>,
    /// e.g. "30/1" or "24000/1001"
    pub r_frame_rate: Option<String>,
    pub duration: Option<String>,
}

/// Format-level metadata from ffprobe.
#[derive(Debug, Deserialize)]
pub struct FfprobeFormat {
    pub duration: Option<String>,
    pub format_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run `ffprobe` on a video file and return the parsed JSON output.
pub async fn probe_video(path: &Path) -> Result<FfprobeOutput, FfmpegError> {
    if !path.exists() {
        return Err(FfmpegError::VideoNotFound(
            path.to_string_lossy().to_string(),
        ));
    }

    let output = tokio::process::Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str::<FfprobeOutput>(&stdout)
        .map_err(|e| FfmpegError::ParseError(format!("{e}: {stdout}")))
}

/// Extract a single full-resolution frame as a JPEG at the given timestamp.
pub async fn extract_frame(
    video_path: &Path,
    output_path: &Path,
    timestamp_secs: f64,
) -> Result<(), FfmpegError> {
    if !video_path.exists() {
        return Err(FfmpegError::VideoNotFound(
            video_path.to_string_lossy().to_string(),
        ));
    }

    let output = tokio::process::Command::new("ffmpeg")
        .args(["-y", "-ss", &format!("{timestamp_secs:.3}"), "-i"])
        .arg(video_path)
        .args(["-frames:v", "1", "-q:v", "2"])
        .arg(output_path)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    Ok(())
}

/// Probe `video_path` and extract the frame at `ratio` of its duration.
///
/// Returns the timestamp that was sampled.
pub async fn extract_last_frame(
    video_path: &Path,
    output_path: &Path,
    ratio: f64,
) -> Result<f64, FfmpegError> {
    let probe = probe_video(video_path).await?;
    let duration = parse_duration(&probe);
    if duration <= 0.0 {
        return Err(FfmpegError::NoDuration);
    }

    let timestamp = last_frame_timestamp(duration, parse_framerate(&probe), ratio);
    extract_frame(video_path, output_path, timestamp).await?;
    Ok(timestamp)
}

/// Check that an extracted frame exists, is non-empty and decodes as an
/// image header. Returns `(width, height)`.
pub fn verify_frame_image(path: &Path) -> Result<(u32, u32), FfmpegError> {
    let display = path.to_string_lossy().to_string();
    let len = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(FfmpegError::EmptyOutput(display));
        }
        Err(e) => return Err(FfmpegError::IoError(e)),
    };
    if len == 0 {
        return Err(FfmpegError::EmptyOutput(display));
    }

    image::image_dimensions(path).map_err(|e| FfmpegError::InvalidImage(format!("{display}: {e}")))
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Timestamp at which to sample the "last" frame of a clip.
///
/// `duration * ratio`, but never later than one frame before the end so
/// that ffmpeg has something to decode on very short clips.
pub fn last_frame_timestamp(duration_secs: f64, framerate: f64, ratio: f64) -> f64 {
    let ratio = ratio.clamp(0.0, 1.0);
    let one_frame = if framerate > 0.0 { 1.0 / framerate } else { 0.0 };
    let latest = (duration_secs - one_frame).max(0.0);
    (duration_secs * ratio).min(latest).max(0.0)
}

/// Find the first video stream in the ffprobe output.
fn first_video_stream(probe: &FfprobeOutput) -> Option<&FfprobeStream> {
    probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
}

/// Parse the video duration in seconds from ffprobe output.
pub fn parse_duration(probe: &FfprobeOutput) -> f64 {
    // Try format-level duration first.
    if let Some(secs) = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
    {
        return secs;
    }
    // Fall back to the first video stream's duration.
    first_video_stream(probe)
        .and_then(|s| s.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Parse the video framerate from ffprobe output.
///
/// The `r_frame_rate` field is a fraction like `"30/1"` or `"24000/1001"`.
pub fn parse_framerate(probe: &FfprobeOutput) -> f64 {
    first_video_stream(probe)
        .and_then(|s| s.r_frame_rate.as_deref())
        .map(parse_fraction)
        .unwrap_or(0.0)
}

/// Parse a fraction string like `"30/1"` into a float.
fn parse_fraction(s: &str) -> f64 {
    let parts: Vec<&str> = s.split('/').collect();
    if parts.len() == 2 {
        let num = parts[0].parse::<f64>().unwrap_or(0.0);
        let den = parts[1].parse::<f64>().unwrap_or(1.0);
        if den > 0.0 {
            return num / den;
        }
    }
    s.parse::<f64>().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn video_stream(duration: Option<&str>, rate: Option<&str>) -> FfprobeStream {
        FfprobeStream {
            index: 0,
            codec_name: Some("h264".into()),
            codec_type: Some("video".into()),
            r_frame_rate: rate.map(Into::into),
            duration: duration.map(Into::into),
        }
    }

    fn probe(format_duration: Option<&str>, stream: FfprobeStream) -> FfprobeOutput {
        FfprobeOutput {
            streams: vec![stream],
            format: FfprobeFormat {
                duration: format_duration.map(Into::into),
                format_name: Some("mov,mp4,m4a,3gp,3g2,mj2".into()),
            },
        }
    }

    #[test]
    fn test_parse_fraction_standard() {
        assert!((parse_fraction("24/1") - 24.0).abs() < 0.001);
    }

    #[test]
    fn test_parse_fraction_ntsc() {
        let fps = parse_fraction("24000/1001");
        assert!((fps - 23.976).abs() < 0.01);
    }

    #[test]
    fn test_parse_fraction_zero_denominator() {
        assert!((parse_fraction("30/0") - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_parse_duration_prefers_format() {
        let p = probe(Some("10.04"), video_stream(Some("9.9"), Some("24/1")));
        assert!((parse_duration(&p) - 10.04).abs() < 0.001);
    }

    #[test]
    fn test_parse_duration_falls_back_to_stream() {
        let p = probe(None, video_stream(Some("5.0"), Some("24/1")));
        assert!((parse_duration(&p) - 5.0).abs() < 0.001);
    }

    #[test]
    fn test_parse_duration_missing_everywhere() {
        let p = probe(None, video_stream(None, None));
        assert_eq!(parse_duration(&p), 0.0);
    }

    #[test]
    fn test_probe_output_deserializes() {
        let json = r#"{
            "streams": [{"index": 0, "codec_type": "video", "codec_name": "h264",
                         "width": 1280, "height": 720, "r_frame_rate": "24/1"}],
            "format": {"duration": "5.041667", "format_name": "mov,mp4"}
        }"#;
        let p: FfprobeOutput = serde_json::from_str(json).unwrap();
        assert!((parse_framerate(&p) - 24.0).abs() < 0.001);
        assert!((parse_duration(&p) - 5.041667).abs() < 0.0001);
    }

    #[test]
    fn last_frame_is_sampled_at_ratio() {
        let ts = last_frame_timestamp(10.0, 24.0, DEFAULT_LAST_FRAME_RATIO);
        assert!((ts - 9.9).abs() < 0.001);
    }

    #[test]
    fn last_frame_never_past_final_frame() {
        // 0.5s at 24fps: 99% would land inside the final frame interval.
        let ts = last_frame_timestamp(0.5, 24.0, DEFAULT_LAST_FRAME_RATIO);
        assert!(ts <= 0.5 - 1.0 / 24.0 + 1e-9);
        assert!(ts >= 0.0);
    }

    #[test]
    fn last_frame_clamps_ratio() {
        assert_eq!(last_frame_timestamp(10.0, 0.0, 1.5), 10.0);
        assert_eq!(last_frame_timestamp(10.0, 0.0, -1.0), 0.0);
    }

    #[test]
    fn verify_rejects_missing_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.jpg");
        assert_matches!(verify_frame_image(&missing), Err(FfmpegError::EmptyOutput(_)));

        let empty = dir.path().join("empty.jpg");
        std::fs::write(&empty, b"").unwrap();
        assert_matches!(verify_frame_image(&empty), Err(FfmpegError::EmptyOutput(_)));

        let garbage = dir.path().join("garbage.jpg");
        std::fs::write(&garbage, b"definitely not a jpeg").unwrap();
        assert_matches!(verify_frame_image(&garbage), Err(FfmpegError::InvalidImage(_)));
    }

    #[test]
    fn verify_accepts_real_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        // 1x1 RGBA PNG.
        let png: &[u8] = &[
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48,
            0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00,
            0x00, 0x1F, 0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78,
            0x9C, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00,
            0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
        ];
        std::fs::write(&path, png).unwrap();
        assert_eq!(verify_frame_image(&path).unwrap(), (1, 1));
    }
}
