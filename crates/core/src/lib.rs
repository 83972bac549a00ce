pub mod archive;
pub mod config;
pub mod metrics;
pub mod task;
pub mod testing;

pub use archive::{
    ArchivePipeline, FetchError, Fetcher, HttpFetcher, PipelineError, PipelineHandle,
    PipelineReport, RetryPolicy,
};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError,
};
pub use task::{
    AddedFile, FileRecord, ShutdownOutcome, TaskError, TaskManager, TaskRef, TaskSnapshot,
    TaskStatus,
};
