//! Task manager: admission control, the task table and the shutdown drain.
//!
//! Lock order: the table lock is never held while a task lock is taken.
//! Every operation that needs both looks the task up, releases the table
//! lock, then locks the task. Pipelines only ever lock their own task and,
//! when releasing their slot, the table.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::archive::{ArchivePipeline, PipelineHandle};
use crate::metrics::{TASKS_ACTIVE, TASKS_CREATED, TASKS_REJECTED};

use super::entry::{Appended, Task};
use super::error::TaskError;
use super::types::{
    is_allowed_extension, is_valid_task_id, TaskSnapshot, TaskStatus, MAX_FILES_PER_TASK,
};

/// Tasks and the admission counter, guarded together.
#[derive(Debug, Default)]
struct Table {
    tasks: HashMap<String, Arc<Task>>,
    active: usize,
    /// Bumped by shutdown so slots taken before it cannot release after it.
    epoch: u64,
}

#[derive(Debug)]
struct Admission {
    table: Mutex<Table>,
    max_active: usize,
    active_tx: watch::Sender<usize>,
}

impl Admission {
    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Broadcast the counter. Called with the table lock held so observers
    /// see values in mutation order.
    fn publish(&self, active: usize) {
        self.active_tx.send_replace(active);
        TASKS_ACTIVE.set(active as i64);
    }
}

/// One unit of admission capacity held by a running pipeline.
///
/// Released on drop, so a panicking pipeline still frees its slot.
struct AdmissionSlot {
    admission: Arc<Admission>,
    epoch: u64,
    task_id: String,
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        let mut table = self.admission.lock();
        if table.epoch != self.epoch {
            debug!(task_id = %self.task_id, "Ignoring slot release from before shutdown");
            return;
        }
        table.active = table.active.saturating_sub(1);
        let active = table.active;
        self.admission.publish(active);
        debug!(task_id = %self.task_id, active, "Admission slot released");
    }
}

/// Read-only view of a task held by the manager.
///
/// It can only produce snapshots; all mutation goes through the manager.
#[derive(Debug, Clone)]
pub struct TaskRef {
    task: Arc<Task>,
}

impl TaskRef {
    pub fn id(&self) -> &str {
        self.task.id()
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        self.task.snapshot()
    }
}

/// Result of a successful `add_file`.
#[derive(Debug)]
pub struct AddedFile {
    /// Files held by the task after this call.
    pub files_count: usize,
    /// Set when this call filled the quota and started the archive pipeline.
    pub pipeline: Option<PipelineHandle>,
}

/// How the shutdown wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every admitted task finished before the deadline.
    Drained,
    /// The deadline passed with tasks still holding slots.
    TimedOut { active: usize },
}

/// Owns every task, limits how many are active, and launches pipelines.
pub struct TaskManager {
    admission: Arc<Admission>,
    pipeline: Arc<ArchivePipeline>,
}

impl TaskManager {
    /// Creates a manager admitting at most `max_active` tasks at a time.
    pub fn new(max_active: usize, pipeline: ArchivePipeline) -> Self {
        let (active_tx, _) = watch::channel(0);
        Self {
            admission: Arc::new(Admission {
                table: Mutex::new(Table::default()),
                max_active,
                active_tx,
            }),
            pipeline: Arc::new(pipeline),
        }
    }

    /// Tasks currently holding an admission slot.
    pub fn active_count(&self) -> usize {
        self.admission.lock().active
    }

    /// Tasks in the table, finished or not.
    pub fn task_count(&self) -> usize {
        self.admission.lock().tasks.len()
    }

    /// Admit a new task with the given id.
    pub fn create_task(&self, id: impl Into<String>) -> Result<TaskRef, TaskError> {
        let id = id.into();
        if !is_valid_task_id(&id) {
            return Err(TaskError::InvalidId(id));
        }
        let max = self.admission.max_active;

        let mut table = self.admission.lock();
        if table.active >= max {
            drop(table);
            TASKS_REJECTED.inc();
            warn!(task_id = %id, max, "Task rejected: capacity reached");
            return Err(TaskError::CapacityExceeded { max });
        }
        if table.tasks.contains_key(&id) {
            return Err(TaskError::AlreadyExists(id));
        }

        let task = Arc::new(Task::new(id.clone()));
        table.tasks.insert(id.clone(), Arc::clone(&task));
        table.active += 1;
        let active = table.active;
        self.admission.publish(active);
        drop(table);

        TASKS_CREATED.inc();
        info!(task_id = %id, active, max, "Task created");
        Ok(TaskRef { task })
    }

    /// Look up a task by id.
    pub fn get_task(&self, id: &str) -> Result<TaskRef, TaskError> {
        self.lookup(id).map(|(task, _)| TaskRef { task })
    }

    /// Consistent copy of a task's state.
    pub fn snapshot(&self, id: &str) -> Result<TaskSnapshot, TaskError> {
        self.get_task(id).map(|task| task.snapshot())
    }

    /// Location of a finished task's archive.
    pub fn archive_path(&self, id: &str) -> Result<PathBuf, TaskError> {
        let snapshot = self.snapshot(id)?;
        match (snapshot.status, snapshot.archive_path) {
            (TaskStatus::Done, Some(path)) => Ok(path),
            (status, _) => Err(TaskError::NotReady {
                task_id: snapshot.id,
                status: status.to_string(),
            }),
        }
    }

    /// Add a file URL to a task.
    ///
    /// The call that brings the task to its quota launches the archive
    /// pipeline in the background and returns its handle. Must be called
    /// from within a tokio runtime.
    pub fn add_file(&self, task_id: &str, url: &str) -> Result<AddedFile, TaskError> {
        let (task, epoch) = self.lookup(task_id)?;

        if !is_allowed_extension(url) {
            return Err(TaskError::UnsupportedType {
                url: url.to_string(),
            });
        }

        match task.push_file(url)? {
            Appended::Pending { files_count } => {
                debug!(task_id = %task_id, url = %url, files_count, "File added");
                Ok(AddedFile {
                    files_count,
                    pipeline: None,
                })
            }
            Appended::QuotaReached { urls } => {
                info!(task_id = %task_id, url = %url, "File quota reached, starting archive pipeline");
                let handle = self.launch(task, epoch, urls);
                Ok(AddedFile {
                    files_count: MAX_FILES_PER_TASK,
                    pipeline: Some(handle),
                })
            }
        }
    }

    /// Wait up to `grace` for every admitted task to finish, then clear all
    /// state. Running pipelines are not cancelled.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownOutcome {
        let mut active_rx = self.admission.active_tx.subscribe();
        let drained = tokio::time::timeout(grace, active_rx.wait_for(|active| *active == 0))
            .await
            .is_ok();

        let outcome = if drained {
            info!("All tasks completed successfully");
            ShutdownOutcome::Drained
        } else {
            let active = *active_rx.borrow();
            warn!(active, "Shutdown timeout, terminating with active tasks");
            ShutdownOutcome::TimedOut { active }
        };

        let mut table = self.admission.lock();
        table.tasks.clear();
        table.active = 0;
        table.epoch += 1;
        self.admission.publish(0);

        outcome
    }

    /// Clone the task out of the table; the table lock is released on return.
    fn lookup(&self, id: &str) -> Result<(Arc<Task>, u64), TaskError> {
        let table = self.admission.lock();
        table
            .tasks
            .get(id)
            .map(|task| (Arc::clone(task), table.epoch))
            .ok_or_else(|| TaskError::NotFound(id.to_string()))
    }

    fn launch(&self, task: Arc<Task>, epoch: u64, urls: Vec<String>) -> PipelineHandle {
        let task_id = task.id().to_string();
        let slot = AdmissionSlot {
            admission: Arc::clone(&self.admission),
            epoch,
            task_id: task_id.clone(),
        };
        let pipeline = Arc::clone(&self.pipeline);

        let handle = tokio::spawn(async move {
            let report = pipeline.run(&task, urls).await;
            drop(slot);
            report
        });

        PipelineHandle::new(task_id, handle)
    }
}
