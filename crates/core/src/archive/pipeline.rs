//! Archive pipeline implementation.

use futures::future::join_all;
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ArchiveConfig;
use crate::metrics::{PIPELINE_DURATION, PIPELINE_RUNS};
use crate::task::{FileRecord, Task, TaskStatus};

use super::error::{FetchError, PipelineError};
use super::fetcher::Fetcher;
use super::filename::{disambiguate, parse_file_url};
use super::retry::RetryPolicy;
use super::zip_builder::build_zip;

/// Final state of a task after its pipeline ran.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub task_id: String,
    pub status: TaskStatus,
    pub files: Vec<FileRecord>,
    pub archive_path: Option<PathBuf>,
    pub error: Option<String>,
    pub duration: Duration,
}

/// Handle to a pipeline running in the background.
///
/// Dropping the handle detaches the pipeline; it keeps running.
#[derive(Debug)]
pub struct PipelineHandle {
    task_id: String,
    handle: JoinHandle<PipelineReport>,
}

impl PipelineHandle {
    pub(crate) fn new(task_id: String, handle: JoinHandle<PipelineReport>) -> Self {
        Self { task_id, handle }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Wait for the pipeline to reach a terminal status.
    pub async fn wait(self) -> Result<PipelineReport, PipelineError> {
        self.handle
            .await
            .map_err(|e| PipelineError::Aborted(e.to_string()))
    }
}

/// Downloads a task's files and bundles them into a zip archive.
pub struct ArchivePipeline {
    config: ArchiveConfig,
    fetcher: Arc<dyn Fetcher>,
    retry: RetryPolicy,
}

impl ArchivePipeline {
    /// Creates a pipeline with the default one-second backoff unit.
    pub fn new(config: ArchiveConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config,
            fetcher,
            retry: RetryPolicy::default(),
        }
    }

    /// Sets the length of one backoff unit.
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.retry = RetryPolicy::new(unit);
        self
    }

    /// Where the archive for `task_id` is written.
    pub fn archive_path_for(&self, task_id: &str) -> PathBuf {
        self.config.output_dir.join(format!("{task_id}.zip"))
    }

    /// Runs the full pipeline for a task whose quota was just reached.
    ///
    /// Never fails: every problem ends up as an `Error` status on the task.
    pub(crate) async fn run(&self, task: &Task, urls: Vec<String>) -> PipelineReport {
        let started = Instant::now();
        let task_id = task.id().to_string();
        info!(task_id = %task_id, files = urls.len(), fetcher = self.fetcher.name(), "Archive pipeline started");

        self.execute(task, &task_id, &urls).await;

        let snapshot = task.snapshot();
        let duration = started.elapsed();
        let result = snapshot.status.as_str();
        PIPELINE_RUNS.with_label_values(&[result]).inc();
        PIPELINE_DURATION
            .with_label_values(&[result])
            .observe(duration.as_secs_f64());

        match snapshot.status {
            TaskStatus::Done => info!(
                task_id = %task_id,
                archive = ?snapshot.archive_path,
                duration_ms = duration.as_millis() as u64,
                "Archive pipeline completed"
            ),
            _ => warn!(
                task_id = %task_id,
                error = snapshot.error.as_deref().unwrap_or("unknown"),
                "Archive pipeline failed"
            ),
        }

        PipelineReport {
            task_id,
            status: snapshot.status,
            files: snapshot.files,
            archive_path: snapshot.archive_path,
            error: snapshot.error,
            duration,
        }
    }

    async fn execute(&self, task: &Task, task_id: &str, urls: &[String]) {
        let workspace = match self.create_workspace(task_id).await {
            Ok(workspace) => workspace,
            Err(e) => {
                error!(task_id = %task_id, error = %e, "Failed to allocate workspace");
                let reason = e.to_string();
                let files = urls
                    .iter()
                    .map(|url| FileRecord::failed(url.as_str(), reason.as_str()))
                    .collect();
                task.fail_with_files(files, reason);
                return;
            }
        };

        let files = self.download_all(urls, workspace.path()).await;
        let failed = files.iter().filter(|f| !f.success).count();
        if failed > 0 {
            task.fail_with_files(
                files,
                format!("{} of {} files failed to download", failed, urls.len()),
            );
            discard(workspace).await;
            return;
        }

        task.commit_files(files);
        let archived = self.archive(task_id, workspace.path()).await;
        discard(workspace).await;

        match archived {
            Ok(path) => {
                task.mark_done(path);
            }
            Err(e) => {
                error!(task_id = %task_id, error = %e, "Failed to build archive");
                task.mark_failed(e.to_string());
            }
        }
    }

    async fn create_workspace(&self, task_id: &str) -> Result<TempDir, PipelineError> {
        let root = self.config.temp_dir.clone();
        let workspace_err = |source| PipelineError::Workspace {
            path: root.clone(),
            source,
        };

        tokio::fs::create_dir_all(&root).await.map_err(workspace_err)?;
        let workspace = tempfile::Builder::new()
            .prefix(&format!("{task_id}-"))
            .tempdir_in(&root)
            .map_err(workspace_err)?;

        debug!(task_id = %task_id, path = %workspace.path().display(), "Workspace created");
        Ok(workspace)
    }

    /// Download every URL concurrently. Output order matches `urls`.
    async fn download_all(&self, urls: &[String], dir: &Path) -> Vec<FileRecord> {
        let parsed: Vec<Result<(Url, String), FetchError>> =
            urls.iter().map(|raw| parse_file_url(raw)).collect();
        let names = disambiguate(
            parsed
                .iter()
                .map(|p| p.as_ref().ok().map(|(_, name)| name.clone()))
                .collect(),
        );

        let downloads = urls
            .iter()
            .zip(parsed.into_iter().zip(names))
            .map(|(raw, (parsed, name))| {
                let target =
                    parsed.map(|(url, original)| (url, dir.join(name.unwrap_or(original))));
                self.download_one(raw, target)
            });

        join_all(downloads).await
    }

    async fn download_one(
        &self,
        raw: &str,
        target: Result<(Url, PathBuf), FetchError>,
    ) -> FileRecord {
        let result = match target {
            Ok((url, dest)) => self.retry.fetch(self.fetcher.as_ref(), &url, &dest).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(bytes) => {
                debug!(url = raw, bytes, "File downloaded");
                FileRecord::succeeded(raw)
            }
            Err(e) => {
                warn!(url = raw, error = %e, "File download failed");
                FileRecord::failed(raw, e.to_string())
            }
        }
    }

    async fn archive(&self, task_id: &str, workspace: &Path) -> Result<PathBuf, PipelineError> {
        let output_dir = self.config.output_dir.clone();
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|source| PipelineError::OutputDir {
                path: output_dir.clone(),
                source,
            })?;

        let dest = self.archive_path_for(task_id);
        let source = workspace.to_path_buf();
        let target = dest.clone();
        let entries = tokio::task::spawn_blocking(move || build_zip(&source, &target))
            .await
            .map_err(|e| PipelineError::Aborted(e.to_string()))??;

        debug!(task_id = %task_id, entries, path = %dest.display(), "Archive written");
        Ok(dest)
    }
}

/// Remove a workspace off the async threads, logging failures.
async fn discard(workspace: TempDir) {
    let path = workspace.path().to_path_buf();
    match tokio::task::spawn_blocking(move || workspace.close()).await {
        Ok(Ok(())) => debug!(path = %path.display(), "Workspace removed"),
        Ok(Err(e)) => warn!(path = %path.display(), error = %e, "Failed to remove workspace"),
        Err(e) => warn!(path = %path.display(), error = %e, "Workspace cleanup aborted"),
    }
}
