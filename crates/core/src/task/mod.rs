//! Task lifecycle: admission, file accumulation and status tracking.
//!
//! A task is admitted by `TaskManager::create_task`, collects up to
//! `MAX_FILES_PER_TASK` URLs, and hands them to the archive pipeline as soon
//! as the last one arrives. Its status then moves once from `InProgress` to
//! either `Done` or `Error`.

mod entry;
mod error;
mod manager;
mod types;

pub(crate) use entry::Task;
pub use error::TaskError;
pub use manager::{AddedFile, ShutdownOutcome, TaskManager, TaskRef};
pub use types::*;
