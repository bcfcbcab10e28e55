use crate::error::ProviderError;
use crate::types::{SegmentRequest, TaskId, TaskSnapshot};

/// Submit-and-poll access to a remote video generation service.
///
/// Implementations are expected to be slow and occasionally unavailable;
/// callers own retry and timeout policy.
#[async_trait::async_trait]
pub trait TaskClient: Send + Sync {
    /// Create a generation task and return its id.
    async fn submit(&self, request: &SegmentRequest) -> Result<TaskId, ProviderError>;

    /// Fetch the current status of a task.
    async fn poll(&self, task_id: &str) -> Result<TaskSnapshot, ProviderError>;

    /// Ask the provider to abandon a task. Best effort.
    async fn cancel(&self, task_id: &str) -> Result<(), ProviderError>;
}
