//! HTTP client for the content-generation task API.
//!
//! Tasks are created with `POST {base}/contents/generations/tasks`, read
//! with `GET .../tasks/{id}` and cancelled with `DELETE .../tasks/{id}`.
//! All calls carry a bearer API key.

use crate::client::TaskClient;
use crate::error::ProviderError;
use crate::types::{
    ContentPart, CreateTaskRequest, CreateTaskResponse, GenerationParams, ImageRef,
    SegmentRequest, TaskId, TaskResponse, TaskSnapshot,
};

pub const DEFAULT_BASE_URL: &str = "https://ark.ap-southeast.bytepluses.com/api/v3";

/// Connection and generation settings for [`ArkClient`].
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    /// Video model id submitted with every task.
    pub model: String,
    pub resolution: String,
    pub camera_fixed: bool,
}

pub struct ArkClient {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl ArkClient {
    pub fn new(config: ProviderConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, mut config: ProviderConfig) -> Self {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Self { client, config }
    }

    fn tasks_url(&self) -> String {
        format!("{}/contents/generations/tasks", self.config.base_url)
    }

    fn task_url(&self, task_id: &str) -> String {
        format!("{}/{task_id}", self.tasks_url())
    }

    /// Request body for one segment: prompt text with the encoded flags,
    /// followed by the seed image.
    pub fn build_request(&self, request: &SegmentRequest) -> CreateTaskRequest {
        let params = GenerationParams {
            resolution: self.config.resolution.clone(),
            duration_secs: request.duration_secs,
            camera_fixed: self.config.camera_fixed,
        };
        CreateTaskRequest {
            model: self.config.model.clone(),
            content: vec![
                ContentPart::Text {
                    text: format!("{} {}", request.prompt, params.render()),
                },
                ContentPart::ImageUrl {
                    image_url: ImageRef {
                        url: request.seed_image_url.clone(),
                    },
                },
            ],
        }
    }

    // ---- private helpers ----

    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[async_trait::async_trait]
impl TaskClient for ArkClient {
    async fn submit(&self, request: &SegmentRequest) -> Result<TaskId, ProviderError> {
        let body = self.build_request(request);
        let response = self
            .client
            .post(self.tasks_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let created: CreateTaskResponse = match Self::parse_response(response).await {
            Ok(created) => created,
            Err(ProviderError::ApiError { status, body }) => {
                return Err(ProviderError::Submission { status, body });
            }
            Err(e) => return Err(e),
        };
        tracing::debug!(task_id = %created.id, duration_secs = request.duration_secs, "Task created");
        Ok(created.id)
    }

    async fn poll(&self, task_id: &str) -> Result<TaskSnapshot, ProviderError> {
        let response = self
            .client
            .get(self.task_url(task_id))
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        let task: TaskResponse = Self::parse_response(response).await?;
        Ok(task.into())
    }

    async fn cancel(&self, task_id: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .delete(self.task_url(task_id))
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use assert_matches::assert_matches;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};

    use super::*;
    use crate::types::TaskStatus;

    #[derive(Clone, Default)]
    struct Recorded {
        bodies: Arc<Mutex<Vec<serde_json::Value>>>,
        auth: Arc<Mutex<Vec<String>>>,
        deleted: Arc<Mutex<Vec<String>>>,
    }

    fn record_auth(state: &Recorded, headers: &HeaderMap) {
        if let Some(value) = headers.get("authorization") {
            state
                .auth
                .lock()
                .unwrap()
                .push(value.to_str().unwrap().to_string());
        }
    }

    async fn create(
        State(state): State<Recorded>,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        record_auth(&state, &headers);
        let rejected = body["model"] == "bad-model";
        state.bodies.lock().unwrap().push(body);
        if rejected {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": { "message": "unknown model" } })),
            );
        }
        (StatusCode::OK, Json(serde_json::json!({ "id": "cgt-42" })))
    }

    async fn status(Path(id): Path<String>) -> (StatusCode, Json<serde_json::Value>) {
        match id.as_str() {
            "cgt-42" => (
                StatusCode::OK,
                Json(serde_json::json!({
                    "id": id,
                    "status": "succeeded",
                    "content": { "video_url": "https://video.test/42.mp4" }
                })),
            ),
            "cgt-running" => (
                StatusCode::OK,
                Json(serde_json::json!({ "id": id, "status": "running" })),
            ),
            "cgt-garbled" => (StatusCode::OK, Json(serde_json::json!({ "id": id }))),
            _ => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": "busy" })),
            ),
        }
    }

    async fn delete(State(state): State<Recorded>, Path(id): Path<String>) -> StatusCode {
        state.deleted.lock().unwrap().push(id);
        StatusCode::OK
    }

    async fn spawn_server() -> (String, Recorded) {
        let recorded = Recorded::default();
        let app = Router::new()
            .route("/api/v3/contents/generations/tasks", post(create))
            .route(
                "/api/v3/contents/generations/tasks/{id}",
                get(status).delete(delete),
            )
            .with_state(recorded.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/api/v3/"), recorded)
    }

    fn client(base_url: String, model: &str) -> ArkClient {
        ArkClient::new(ProviderConfig {
            base_url,
            api_key: "secret".into(),
            model: model.into(),
            resolution: "720p".into(),
            camera_fixed: false,
        })
    }

    fn request() -> SegmentRequest {
        SegmentRequest {
            prompt: "Scene 3: The keeper lights the lamp".into(),
            seed_image_url: "https://cdn.test/frames/job_1.jpg".into(),
            duration_secs: 5,
        }
    }

    #[tokio::test]
    async fn submit_sends_prompt_flags_and_seed_image() {
        let (base, recorded) = spawn_server().await;
        let client = client(base, "video-model");

        let task_id = client.submit(&request()).await.unwrap();
        assert_eq!(task_id, "cgt-42");

        let bodies = recorded.bodies.lock().unwrap();
        assert_eq!(
            bodies[0],
            serde_json::json!({
                "model": "video-model",
                "content": [
                    {
                        "type": "text",
                        "text": "Scene 3: The keeper lights the lamp --resolution 720p --duration 5 --camerafixed false"
                    },
                    {
                        "type": "image_url",
                        "image_url": { "url": "https://cdn.test/frames/job_1.jpg" }
                    }
                ]
            })
        );
        assert_eq!(recorded.auth.lock().unwrap()[0], "Bearer secret");
    }

    #[tokio::test]
    async fn rejected_submission_is_a_submission_error() {
        let (base, _) = spawn_server().await;
        let client = client(base, "bad-model");

        assert_matches!(
            client.submit(&request()).await,
            Err(ProviderError::Submission { status: 400, .. })
        );
    }

    #[tokio::test]
    async fn poll_maps_status_and_video_url() {
        let (base, _) = spawn_server().await;
        let client = client(base, "video-model");

        assert_eq!(
            client.poll("cgt-42").await.unwrap(),
            TaskSnapshot::succeeded("https://video.test/42.mp4")
        );
        assert_eq!(
            client.poll("cgt-running").await.unwrap().status,
            TaskStatus::Running
        );
    }

    #[tokio::test]
    async fn poll_surfaces_api_and_decode_errors() {
        let (base, _) = spawn_server().await;
        let client = client(base, "video-model");

        assert_matches!(
            client.poll("cgt-missing").await,
            Err(ProviderError::ApiError { status: 503, .. })
        );
        assert_matches!(
            client.poll("cgt-garbled").await,
            Err(ProviderError::Decode(_))
        );
    }

    #[tokio::test]
    async fn cancel_deletes_the_task() {
        let (base, recorded) = spawn_server().await;
        let client = client(base, "video-model");

        client.cancel("cgt-42").await.unwrap();
        assert_eq!(*recorded.deleted.lock().unwrap(), vec!["cgt-42".to_string()]);
    }
}
