//! In-process [`TaskClient`] and [`FrameExtractor`] doubles.
//!
//! Used by this crate's tests and by the API integration tests to drive
//! the pipeline without a provider or ffmpeg.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use framechain_core::ffmpeg::FfmpegError;
use framechain_provider::{ProviderError, SegmentRequest, TaskClient, TaskId, TaskSnapshot};

use crate::frames::{FrameError, FrameExtractor};

/// One scripted response to a poll.
#[derive(Debug, Clone)]
pub enum PollStep {
    Snapshot(TaskSnapshot),
    /// Fails the poll as a 503 from the provider.
    Unavailable,
}

#[derive(Default)]
struct ClientState {
    next_task: u32,
    reject_submissions: bool,
    submissions: Vec<SegmentRequest>,
    scripts: HashMap<TaskId, VecDeque<PollStep>>,
    default_script: Option<Vec<PollStep>>,
    poll_counts: HashMap<TaskId, u32>,
    cancelled: Vec<TaskId>,
}

/// Task client that hands out ids `task-1`, `task-2`, ... and answers
/// polls from per-task scripts.
///
/// The last step of a script repeats once the script is exhausted. Tasks
/// without a script succeed immediately with
/// `https://video.test/{task_id}.mp4`.
#[derive(Default)]
pub struct ScriptedTaskClient {
    state: Mutex<ClientState>,
}

impl ScriptedTaskClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Script the poll responses for `task_id`.
    pub fn script(&self, task_id: &str, steps: impl IntoIterator<Item = PollStep>) {
        self.state()
            .scripts
            .insert(task_id.to_string(), steps.into_iter().collect());
    }

    /// Script used for every task without its own.
    pub fn set_default_script(&self, steps: impl IntoIterator<Item = PollStep>) {
        self.state().default_script = Some(steps.into_iter().collect());
    }

    /// Make every subsequent submission fail with a 400.
    pub fn reject_submissions(&self) {
        self.state().reject_submissions = true;
    }

    /// Every request submitted so far, in order.
    pub fn submissions(&self) -> Vec<SegmentRequest> {
        self.state().submissions.clone()
    }

    pub fn poll_count(&self, task_id: &str) -> u32 {
        self.state().poll_counts.get(task_id).copied().unwrap_or(0)
    }

    /// Task ids passed to `cancel`.
    pub fn cancelled(&self) -> Vec<TaskId> {
        self.state().cancelled.clone()
    }
}

#[async_trait::async_trait]
impl TaskClient for ScriptedTaskClient {
    async fn submit(&self, request: &SegmentRequest) -> Result<TaskId, ProviderError> {
        let mut state = self.state();
        state.submissions.push(request.clone());
        if state.reject_submissions {
            return Err(ProviderError::Submission {
                status: 400,
                body: "submission rejected".into(),
            });
        }
        state.next_task += 1;
        Ok(format!("task-{}", state.next_task))
    }

    async fn poll(&self, task_id: &str) -> Result<TaskSnapshot, ProviderError> {
        let mut state = self.state();
        *state.poll_counts.entry(task_id.to_string()).or_default() += 1;

        if !state.scripts.contains_key(task_id) {
            let steps = state.default_script.clone().unwrap_or_else(|| {
                vec![PollStep::Snapshot(TaskSnapshot::succeeded(format!(
                    "https://video.test/{task_id}.mp4"
                )))]
            });
            state.scripts.insert(task_id.to_string(), steps.into());
        }

        let script = state
            .scripts
            .get_mut(task_id)
            .ok_or_else(|| ProviderError::Decode(format!("no script for {task_id}")))?;
        let step = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };

        match step {
            Some(PollStep::Snapshot(snapshot)) => Ok(snapshot),
            Some(PollStep::Unavailable) => Err(ProviderError::ApiError {
                status: 503,
                body: "unavailable".into(),
            }),
            None => Err(ProviderError::Decode(format!("empty script for {task_id}"))),
        }
    }

    async fn cancel(&self, task_id: &str) -> Result<(), ProviderError> {
        self.state().cancelled.push(task_id.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct ExtractorState {
    calls: Vec<(String, String)>,
    fail: bool,
}

/// Frame extractor that returns `https://cdn.test/{key}` without touching
/// the video.
#[derive(Default)]
pub struct FakeFrameExtractor {
    state: Mutex<ExtractorState>,
}

impl FakeFrameExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ExtractorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every subsequent extraction fail.
    pub fn fail(&self) {
        self.state().fail = true;
    }

    /// `(video_url, key)` pairs seen so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.state().calls.clone()
    }

    pub fn frame_url_for(key: &str) -> String {
        format!("https://cdn.test/{key}")
    }
}

#[async_trait::async_trait]
impl FrameExtractor for FakeFrameExtractor {
    async fn extract_last_frame(&self, video_url: &str, key: &str) -> Result<String, FrameError> {
        let mut state = self.state();
        state.calls.push((video_url.to_string(), key.to_string()));
        if state.fail {
            return Err(FrameError::Ffmpeg(FfmpegError::EmptyOutput(key.to_string())));
        }
        Ok(Self::frame_url_for(key))
    }
}
