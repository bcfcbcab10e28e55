//! Bounded polling of a remote generation task.
//!
//! [`wait_for_task`] sleeps, polls, and repeats until the task reaches a
//! terminal status, the wait budget runs out, the provider stays
//! unreachable for too many consecutive polls, or the caller cancels.
//! Every sleep and every poll races the [`CancellationToken`].

use std::time::Duration;

use framechain_provider::{ProviderError, TaskClient, TaskStatus};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Tunable polling parameters.
///
/// The defaults poll every 5 seconds for up to 15 minutes. A `multiplier`
/// above 1.0 turns the fixed interval into exponential backoff capped at
/// `max_interval`.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Delay before the first poll.
    pub interval: Duration,
    /// Upper bound on the delay between polls.
    pub max_interval: Duration,
    /// Factor by which the delay grows after each poll.
    pub multiplier: f64,
    /// Total time to wait for a terminal status.
    pub max_wait: Duration,
    /// Transport failures tolerated in a row before giving up.
    pub max_consecutive_errors: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_interval: Duration::from_secs(5),
            multiplier: 1.0,
            max_wait: Duration::from_secs(900),
            max_consecutive_errors: 3,
        }
    }
}

/// Calculate the next delay from the current delay and policy, clamped to
/// [`PollPolicy::max_interval`].
pub fn next_delay(current: Duration, policy: &PollPolicy) -> Duration {
    let next_ms = (current.as_millis() as f64 * policy.multiplier.max(1.0)) as u64;
    Duration::from_millis(next_ms).min(policy.max_interval.max(policy.interval))
}

/// Why polling ended without a video.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("task failed: {0}")]
    Failed(String),

    #[error("task succeeded without a video URL")]
    MissingVideoUrl,

    #[error("no terminal status after {}s", waited.as_secs())]
    Timeout { waited: Duration },

    #[error("polling cancelled")]
    Cancelled,

    #[error("status unavailable after {attempts} consecutive failures: {source}")]
    Unavailable {
        attempts: u32,
        #[source]
        source: ProviderError,
    },
}

/// Poll `task_id` until it succeeds, returning the video URL.
pub async fn wait_for_task(
    client: &dyn TaskClient,
    task_id: &str,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> Result<String, PollError> {
    let started = Instant::now();
    let mut delay = policy.interval;
    let mut attempt = 0u32;
    let mut consecutive_errors = 0u32;

    loop {
        if started.elapsed() + delay > policy.max_wait {
            return Err(PollError::Timeout {
                waited: started.elapsed(),
            });
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            result = client.poll(task_id) => result,
        };

        match result {
            Ok(snapshot) => {
                consecutive_errors = 0;
                tracing::debug!(task_id, attempt, status = ?snapshot.status, "Polled task");
                if snapshot.status.is_terminal() {
                    return if snapshot.status == TaskStatus::Succeeded {
                        snapshot.video_url.ok_or(PollError::MissingVideoUrl)
                    } else {
                        let message = snapshot
                            .error_message
                            .unwrap_or_else(|| "task failed without an error message".into());
                        Err(PollError::Failed(message))
                    };
                }
            }
            Err(e) => {
                consecutive_errors += 1;
                tracing::warn!(
                    task_id,
                    attempt,
                    consecutive_errors,
                    error = %e,
                    "Task poll failed",
                );
                if consecutive_errors >= policy.max_consecutive_errors {
                    return Err(PollError::Unavailable {
                        attempts: consecutive_errors,
                        source: e,
                    });
                }
            }
        }

        delay = next_delay(delay, policy);
    }
}
