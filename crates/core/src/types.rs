/// Generation jobs, scripts and thumbnails are keyed by random v4 UUIDs.
pub type JobId = uuid::Uuid;

/// Identifier of a registered script or thumbnail.
pub type AssetId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Zero-based position of a segment inside a job.
pub type SegmentIndex = u32;
