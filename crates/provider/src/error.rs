/// Errors from a task provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider refused to create the task.
    #[error("Task submission rejected ({status}): {body}")]
    Submission { status: u16, body: String },

    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-2xx response on a status or cancel call.
    #[error("Provider API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    /// The response body did not match the expected shape.
    #[error("Unexpected provider response: {0}")]
    Decode(String),
}
