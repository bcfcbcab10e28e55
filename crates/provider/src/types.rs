//! Task types shared by every [`TaskClient`](crate::client::TaskClient) and
//! the wire format of the content-generation task API.

use serde::{Deserialize, Serialize};

/// Provider-assigned task identifier.
pub type TaskId = String;

/// Lifecycle of a remote generation task.
///
/// The provider guarantees progress is monotone: once `Succeeded` or
/// `Failed` is reported, no further transition occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// One segment's worth of generation input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRequest {
    /// Scene prompt, e.g. `Scene 2: ...`.
    pub prompt: String,
    /// Image the clip starts from.
    pub seed_image_url: String,
    pub duration_secs: u32,
}

/// Result of a single status poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub status: TaskStatus,
    /// Present once `status` is `Succeeded`.
    pub video_url: Option<String>,
    /// Present once `status` is `Failed`.
    pub error_message: Option<String>,
}

impl TaskSnapshot {
    pub fn queued() -> Self {
        Self::with_status(TaskStatus::Queued)
    }

    pub fn running() -> Self {
        Self::with_status(TaskStatus::Running)
    }

    pub fn succeeded(video_url: impl Into<String>) -> Self {
        Self {
            video_url: Some(video_url.into()),
            ..Self::with_status(TaskStatus::Succeeded)
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::with_status(TaskStatus::Failed)
        }
    }

    fn with_status(status: TaskStatus) -> Self {
        Self {
            status,
            video_url: None,
            error_message: None,
        }
    }
}

/// Generation flags appended to the prompt text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationParams {
    pub resolution: String,
    pub duration_secs: u32,
    pub camera_fixed: bool,
}

impl GenerationParams {
    /// Render as `--resolution 720p --duration 10 --camerafixed false`.
    pub fn render(&self) -> String {
        format!(
            "--resolution {} --duration {} --camerafixed {}",
            self.resolution, self.duration_secs, self.camera_fixed
        )
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// Body of `POST /contents/generations/tasks`.
#[derive(Debug, Serialize)]
pub struct CreateTaskRequest {
    pub model: String,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageRef },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRef {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskResponse {
    pub id: TaskId,
}

/// Body of `GET /contents/generations/tasks/{id}`.
#[derive(Debug, Deserialize)]
pub struct TaskResponse {
    pub status: TaskStatus,
    #[serde(default)]
    pub content: Option<TaskContent>,
    #[serde(default)]
    pub error: Option<TaskErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct TaskContent {
    pub video_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TaskErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

impl From<TaskResponse> for TaskSnapshot {
    fn from(response: TaskResponse) -> Self {
        Self {
            status: response.status,
            video_url: response.content.and_then(|c| c.video_url),
            error_message: response.error.map(|e| match e.code {
                Some(code) => format!("{code}: {}", e.message),
                None => e.message,
            }),
        }
    }
}
