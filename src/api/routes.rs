//! API route handlers.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | POST | `/api/process` | Submit a URL for processing, returns a task id |
//! | GET | `/api/tasks/{id}` | Poll the status snapshot of a task |
//! | DELETE | `/api/tasks/{id}` | Request cooperative cancellation |
//! | GET | `/api/platforms` | List recognised platforms |
//! | GET | `/api/health` | Service health and uptime |

use std::path::PathBuf;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::pipeline::{ProcessRequest, ResearchResult};
use crate::platform::{self, Platform};
use crate::tasks::{PipelineStep, Task, TaskStatus};
use crate::{transcribe, utils};

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/api/process", post(submit_task))
        .route("/api/tasks/{id}", get(poll_task).delete(cancel_task))
        .route("/api/platforms", get(list_platforms))
        .route("/api/health", get(health_check));

    // Retained downloads are only exposed when the media dir is populated.
    if state.config.download.keep_media {
        router = router.nest_service(
            "/media",
            ServeDir::new(state.config.download.media_dir.clone()),
        );
    }

    router.with_state(state)
}

/// Request body for submitting a URL.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    /// The video URL to process
    #[serde(default)]
    pub url: String,
    /// Whisper model size (defaults to the configured one)
    pub model_size: Option<String>,
    /// Language override; auto-detected when absent
    pub language: Option<String>,
    /// Optional Instagram username for comment fetching
    pub insta_username: Option<String>,
    /// Optional Instagram password for comment fetching
    pub insta_password: Option<String>,
    /// Requested comment count, clamped to the configured range
    pub max_comments: Option<u32>,
    /// Path to a Netscape cookies.txt usable by yt-dlp and Instagram
    pub cookies_file: Option<String>,
}

#[derive(Debug, Serialize)]
struct SubmitResponse {
    task_id: Uuid,
}

/// Status snapshot returned to pollers.
///
/// `result` and `error` only appear once the task is terminal.
#[derive(Debug, Serialize)]
pub struct TaskSnapshot {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub step: PipelineStep,
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResearchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Task> for TaskSnapshot {
    fn from(task: Task) -> Self {
        Self {
            task_id: task.id,
            status: task.status,
            step: task.step,
            progress: task.progress,
            message: task.message,
            result: task.result,
            error: task.error,
        }
    }
}

#[derive(Debug, Serialize)]
struct CancelResponse {
    task_id: Uuid,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct PlatformsResponse {
    platforms: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
    tracked_tasks: usize,
}

/// Accept a processing request and schedule it as a background task.
///
/// The response carries only the task id; clients poll `/api/tasks/{id}`
/// until they observe a terminal status.
async fn submit_task(
    State(state): State<AppState>,
    Json(body): Json<SubmitRequest>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let url = body.url.trim();
    if url.is_empty() {
        return Err(ApiError::bad_request("URL is required"));
    }

    let url = platform::clean_url(url);
    let url = utils::validate_and_normalize_url(&url)
        .map_err(|error| ApiError::bad_request(error.to_string()))?;

    let model_size = body
        .model_size
        .filter(|size| !size.is_empty())
        .unwrap_or_else(|| state.config.transcription.default_model_size.clone());
    if !transcribe::is_known_model_size(&model_size) {
        return Err(ApiError::bad_request(format!(
            "Unknown model size '{}' (expected one of: {})",
            model_size,
            transcribe::model_sizes().join(", ")
        )));
    }

    let language = body
        .language
        .filter(|language| !language.is_empty())
        .or_else(|| state.config.transcription.default_language.clone());

    let request = ProcessRequest {
        url,
        model_size,
        language,
        insta_username: body.insta_username.filter(|name| !name.is_empty()),
        insta_password: body.insta_password.filter(|password| !password.is_empty()),
        max_comments: state.config.instagram.clamp_max_comments(body.max_comments),
        cookies_file: body
            .cookies_file
            .filter(|path| !path.is_empty())
            .map(PathBuf::from),
    };

    let task_id = state.orchestrator.spawn(request);
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { task_id })))
}

/// Return the current snapshot for a task id.
async fn poll_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaskSnapshot>> {
    let task = state.registry.get(id).map_err(ApiError::from)?;
    Ok(Json(TaskSnapshot::from(task)))
}

/// Request cooperative cancellation of a running task.
///
/// The orchestrator observes the request between stages, so the task may
/// still take a while to reach its terminal state.
async fn cancel_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CancelResponse>> {
    state.registry.request_cancel(id).map_err(ApiError::from)?;
    Ok(Json(CancelResponse {
        task_id: id,
        status: "cancelling",
    }))
}

/// List the platforms with dedicated detection rules.
async fn list_platforms() -> Json<PlatformsResponse> {
    Json(PlatformsResponse {
        platforms: Platform::known().iter().map(|p| p.as_str()).collect(),
    })
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.start_time.elapsed().as_secs(),
        tracked_tasks: state.registry.len(),
    })
}
