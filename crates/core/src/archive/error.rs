//! Error types for the archive pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while fetching a single file.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The submitted string is not a valid absolute URL.
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// No usable file name in the URL path.
    #[error("Cannot determine file name from URL: {url}")]
    MissingFileName { url: String },

    /// The request could not be completed (connect, DNS, body read).
    #[error("Request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status.
    #[error("HTTP status {0}")]
    Status(u16),

    /// Writing the downloaded bytes failed.
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every attempt failed.
    #[error("Download failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Whether another attempt could succeed. Only transport failures qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Status(_))
    }
}

/// Errors from the filesystem side of the pipeline: workspace and archive.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Could not allocate the temporary download workspace.
    #[error("Failed to create workspace under {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create the archive output directory.
    #[error("Failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O failure while reading the workspace or writing the archive.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The zip writer failed.
    #[error("Failed to build archive {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// The blocking archive job did not complete.
    #[error("Archive job aborted: {0}")]
    Aborted(String),
}
