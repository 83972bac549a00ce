//! Task API handlers.

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::error;
use uuid::Uuid;
use zipper_core::{FileRecord, TaskError, TaskSnapshot, TaskStatus};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response for a newly created task
#[derive(Debug, Serialize)]
pub struct CreateTaskResponse {
    pub task_id: String,
}

/// Request body for adding a file to a task
#[derive(Debug, Deserialize)]
pub struct AddFileBody {
    /// Absolute URL of a .pdf, .jpg or .jpeg file
    pub url: String,
}

/// Response for adding a file
#[derive(Debug, Serialize)]
pub struct AddFileResponse {
    pub task_id: String,
    pub files_count: usize,
    /// True when this file completed the task and archiving started.
    pub archiving: bool,
}

/// Response for task queries
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: String,
    pub status: TaskStatus,
    pub files: Vec<FileRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

impl From<TaskSnapshot> for TaskResponse {
    fn from(snapshot: TaskSnapshot) -> Self {
        let archive_url = snapshot
            .archive_path
            .as_ref()
            .map(|_| format!("/api/v1/tasks/{}/archive", snapshot.id));
        Self {
            archive_path: snapshot
                .archive_path
                .map(|path| path.display().to_string()),
            archive_url,
            id: snapshot.id,
            status: snapshot.status,
            files: snapshot.files,
            error: snapshot.error,
            created_at: snapshot.created_at.to_rfc3339(),
            finished_at: snapshot.finished_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct TaskErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<TaskErrorResponse>);

fn task_error(e: TaskError) -> ApiError {
    let status = match e {
        TaskError::CapacityExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        TaskError::NotFound(_) => StatusCode::NOT_FOUND,
        TaskError::InvalidId(_)
        | TaskError::UnsupportedType { .. }
        | TaskError::QuotaExceeded { .. } => StatusCode::BAD_REQUEST,
        TaskError::AlreadyExists(_) | TaskError::NotReady { .. } => StatusCode::CONFLICT,
    };
    (
        status,
        Json(TaskErrorResponse {
            error: e.to_string(),
            code: e.code().to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new task
pub async fn create_task(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<CreateTaskResponse>), impl IntoResponse> {
    let task_id = Uuid::new_v4().to_string();
    match state.manager().create_task(task_id) {
        Ok(task) => Ok((
            StatusCode::CREATED,
            Json(CreateTaskResponse {
                task_id: task.id().to_string(),
            }),
        )),
        Err(e) => Err(task_error(e)),
    }
}

/// Add a file URL to a task
pub async fn add_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<AddFileBody>,
) -> Result<Json<AddFileResponse>, ApiError> {
    let added = state
        .manager()
        .add_file(&id, &body.url)
        .map_err(task_error)?;

    Ok(Json(AddFileResponse {
        task_id: id,
        files_count: added.files_count,
        // The pipeline keeps running after its handle is dropped.
        archiving: added.pipeline.is_some(),
    }))
}

/// Get a task by ID
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, impl IntoResponse> {
    match state.manager().snapshot(&id) {
        Ok(snapshot) => Ok(Json(TaskResponse::from(snapshot))),
        Err(e) => Err(task_error(e)),
    }
}

/// Download the zip archive of a finished task
///
/// The file is streamed from disk rather than read into memory.
pub async fn download_archive(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Request,
) -> Result<Response, ApiError> {
    let path = state.manager().archive_path(&id).map_err(task_error)?;

    let response = match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    if response.status() == StatusCode::NOT_FOUND {
        error!(task_id = %id, path = %path.display(), "Archive missing on disk");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(TaskErrorResponse {
                error: format!("Failed to read archive for task {id}"),
                code: "archive_unreadable".to_string(),
            }),
        ));
    }

    let (mut parts, body) = response.into_parts();
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/zip"),
    );
    let disposition = format!("attachment; filename=\"{id}.zip\"");
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        parts.headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(Response::from_parts(parts, Body::new(body)))
}
