//! Archive module: downloading a task's files and zipping them.
//!
//! The `ArchivePipeline` runs once per task, when its file quota fills:
//! - Workspace: a temporary directory scoped to the task id
//! - Download: all files concurrently, each with a fixed retry schedule
//! - Archive: a zip of the workspace written to the output directory
//!
//! Failures never propagate to the caller that triggered the pipeline. They
//! end up as an `Error` status on the task.

mod error;
mod fetcher;
mod filename;
mod pipeline;
mod retry;
mod zip_builder;

pub use error::{FetchError, PipelineError};
pub use fetcher::{Fetcher, HttpFetcher};
pub use filename::parse_file_url;
pub use pipeline::{ArchivePipeline, PipelineHandle, PipelineReport};
pub use retry::{RetryPolicy, MAX_ATTEMPTS};
pub use zip_builder::build_zip;
