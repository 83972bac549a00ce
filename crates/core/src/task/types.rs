//! Task data types shared by the manager, the pipeline and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Number of files a task accepts. Reaching it triggers the archive pipeline.
pub const MAX_FILES_PER_TASK: usize = 3;

/// File suffixes accepted by `add_file`, compared case-insensitively.
pub const ALLOWED_EXTENSIONS: [&str; 3] = [".pdf", ".jpg", ".jpeg"];

/// Returns true if the URL ends with one of the accepted suffixes.
pub fn is_allowed_extension(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Returns true if `id` can name a task and its archive file.
///
/// The id becomes `<id>.zip` under the output directory, so it must be a
/// single non-empty path component.
pub fn is_valid_task_id(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '\\', '\0'])
}

/// Lifecycle status of a task.
///
/// `InProgress` is the only non-terminal state. `Done` and `Error` are final.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    InProgress,
    Done,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One submitted file and, once the pipeline has run, its outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    pub url: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileRecord {
    /// A freshly accepted file that has not been downloaded yet.
    pub fn pending(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            success: false,
            error: None,
        }
    }

    pub fn succeeded(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Immutable copy of a task's observable state, captured under the task lock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskSnapshot {
    pub id: String,
    pub status: TaskStatus,
    pub files: Vec<FileRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<PathBuf>,
    /// Why the task ended in `Error`, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}
