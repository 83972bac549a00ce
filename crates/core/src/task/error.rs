//! Errors returned synchronously by the task manager.

use thiserror::Error;

/// Errors that can occur when creating, feeding or reading tasks.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    /// Admission refused: too many tasks are active.
    #[error("Server busy: max active tasks reached ({max})")]
    CapacityExceeded { max: usize },

    /// No task with this id.
    #[error("Task not found: {0}")]
    NotFound(String),

    /// The id cannot be used as a file name.
    #[error("Invalid task id: {0:?}")]
    InvalidId(String),

    /// A task with this id already exists.
    #[error("Task already exists: {0}")]
    AlreadyExists(String),

    /// The URL does not point to an accepted file type.
    #[error("Unsupported file type: {url}")]
    UnsupportedType { url: String },

    /// The task already holds its maximum number of files.
    #[error("Max files per task reached ({max}) for task {task_id}")]
    QuotaExceeded { task_id: String, max: usize },

    /// The archive is not available yet, or the task failed.
    #[error("Archive not ready for task {task_id} (status: {status})")]
    NotReady { task_id: String, status: String },
}

impl TaskError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::NotFound(_) => "not_found",
            Self::InvalidId(_) => "invalid_id",
            Self::AlreadyExists(_) => "already_exists",
            Self::UnsupportedType { .. } => "unsupported_type",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::NotReady { .. } => "not_ready",
        }
    }
}
