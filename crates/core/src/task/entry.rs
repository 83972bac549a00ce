//! A single task and its lock-guarded state.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::error::TaskError;
use super::types::{FileRecord, TaskSnapshot, TaskStatus, MAX_FILES_PER_TASK};

/// Result of appending a file to a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Appended {
    /// File stored, quota not yet reached.
    Pending { files_count: usize },
    /// This append filled the quota. Carries the submitted URLs in order.
    QuotaReached { urls: Vec<String> },
}

/// Mutable state, always read and written as one unit.
#[derive(Debug)]
struct TaskState {
    status: TaskStatus,
    files: Vec<FileRecord>,
    archive_path: Option<PathBuf>,
    error: Option<String>,
    finished_at: Option<DateTime<Utc>>,
}

/// A task owned by the manager's table.
///
/// The lock is only held for in-memory updates, never across I/O.
#[derive(Debug)]
pub(crate) struct Task {
    id: String,
    created_at: DateTime<Utc>,
    state: Mutex<TaskState>,
}

impl Task {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            state: Mutex::new(TaskState {
                status: TaskStatus::InProgress,
                files: Vec::with_capacity(MAX_FILES_PER_TASK),
                archive_path: None,
                error: None,
                finished_at: None,
            }),
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    fn lock(&self) -> MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a pending file record unless the quota is already full.
    ///
    /// The count check and the append happen under one lock acquisition, so
    /// exactly one caller ever observes `QuotaReached`.
    pub(crate) fn push_file(&self, url: &str) -> Result<Appended, TaskError> {
        let mut state = self.lock();
        if state.files.len() >= MAX_FILES_PER_TASK {
            return Err(TaskError::QuotaExceeded {
                task_id: self.id.clone(),
                max: MAX_FILES_PER_TASK,
            });
        }

        state.files.push(FileRecord::pending(url));

        if state.files.len() == MAX_FILES_PER_TASK {
            Ok(Appended::QuotaReached {
                urls: state.files.iter().map(|f| f.url.clone()).collect(),
            })
        } else {
            Ok(Appended::Pending {
                files_count: state.files.len(),
            })
        }
    }

    pub(crate) fn snapshot(&self) -> TaskSnapshot {
        let state = self.lock();
        TaskSnapshot {
            id: self.id.clone(),
            status: state.status,
            files: state.files.clone(),
            archive_path: state.archive_path.clone(),
            error: state.error.clone(),
            created_at: self.created_at,
            finished_at: state.finished_at,
        }
    }

    /// Replace the pending records with the final per-file outcomes.
    ///
    /// Ignored once the task is terminal.
    pub(crate) fn commit_files(&self, files: Vec<FileRecord>) {
        let mut state = self.lock();
        if state.status.is_terminal() {
            return;
        }
        state.files = files;
    }

    /// Commit outcomes and move to `Error` in a single step.
    pub(crate) fn fail_with_files(&self, files: Vec<FileRecord>, reason: impl Into<String>) {
        let mut state = self.lock();
        if state.status.is_terminal() {
            return;
        }
        state.files = files;
        Self::finish(&mut state, TaskStatus::Error);
        state.error = Some(reason.into());
    }

    /// Move to `Error`. Returns false if the task was already terminal.
    pub(crate) fn mark_failed(&self, reason: impl Into<String>) -> bool {
        let mut state = self.lock();
        if state.status.is_terminal() {
            return false;
        }
        Self::finish(&mut state, TaskStatus::Error);
        state.error = Some(reason.into());
        true
    }

    /// Record the archive and move to `Done`. Returns false if already terminal.
    pub(crate) fn mark_done(&self, archive_path: PathBuf) -> bool {
        let mut state = self.lock();
        if state.status.is_terminal() {
            return false;
        }
        Self::finish(&mut state, TaskStatus::Done);
        state.archive_path = Some(archive_path);
        true
    }

    fn finish(state: &mut TaskState, status: TaskStatus) {
        state.status = status;
        state.finished_at = Some(Utc::now());
    }
}
