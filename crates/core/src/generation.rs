//! Segment arithmetic and scene prompt construction for chained generation.
//!
//! A job of `total_duration_secs` is cut into `ceil(total / max)` segments.
//! Every segment runs for `max_segment_secs` except the last, which covers
//! whatever remains. Frame extraction utilities live in [`crate::ffmpeg`].

use crate::error::CoreError;
use crate::types::SegmentIndex;

// ---------------------------------------------------------------------------
// Generation defaults
// ---------------------------------------------------------------------------

/// Default upper bound on the length of a single generated segment.
pub const DEFAULT_MAX_SEGMENT_SECS: u32 = 10;

// ---------------------------------------------------------------------------
// Segment arithmetic
// ---------------------------------------------------------------------------

/// Validate the duration inputs of a new job.
pub fn validate_durations(total_duration_secs: u32, max_segment_secs: u32) -> Result<(), CoreError> {
    if total_duration_secs == 0 {
        return Err(CoreError::Validation(
            "total_duration_secs must be positive".to_string(),
        ));
    }
    if max_segment_secs == 0 {
        return Err(CoreError::Validation(
            "max_segment_secs must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Number of segments needed to cover `total_duration_secs`.
///
/// Always `ceil(total / max)`, never less than 1.
pub fn total_segments(total_duration_secs: u32, max_segment_secs: u32) -> Result<u32, CoreError> {
    validate_durations(total_duration_secs, max_segment_secs)?;
    Ok(total_duration_secs.div_ceil(max_segment_secs).max(1))
}

/// Duration of the segment at `index`: `min(max, total - index * max)`.
///
/// Fails with [`CoreError::InvalidSegmentIndex`] outside `[0, total_segments)`,
/// which is exactly the range where the result would be zero or negative.
pub fn segment_duration(
    total_duration_secs: u32,
    max_segment_secs: u32,
    index: SegmentIndex,
) -> Result<u32, CoreError> {
    let total = total_segments(total_duration_secs, max_segment_secs)?;
    if index >= total {
        return Err(CoreError::InvalidSegmentIndex { index, total });
    }
    let elapsed = index * max_segment_secs;
    Ok(max_segment_secs.min(total_duration_secs - elapsed))
}

/// Durations of every segment of a job, in order.
pub fn segment_durations(
    total_duration_secs: u32,
    max_segment_secs: u32,
) -> Result<Vec<u32>, CoreError> {
    let total = total_segments(total_duration_secs, max_segment_secs)?;
    (0..total)
        .map(|index| segment_duration(total_duration_secs, max_segment_secs, index))
        .collect()
}

// ---------------------------------------------------------------------------
// Prompt construction
// ---------------------------------------------------------------------------

/// Scene text submitted for a segment: `"Scene {n}: {script}"`, 1-based.
pub fn scene_prompt(index: SegmentIndex, prompt_text: &str) -> String {
    format!("Scene {}: {}", index + 1, prompt_text.trim())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
