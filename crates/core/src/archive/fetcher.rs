//! File fetchers: the trait used by the pipeline and its HTTP implementation.

use async_trait::async_trait;
use reqwest::{Client, Url};
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::config::DownloaderConfig;

use super::error::FetchError;

/// Something that can copy the resource at a URL into a local file.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Returns the name of this fetcher implementation.
    fn name(&self) -> &str;

    /// Download `url` into `dest`, truncating any existing file.
    ///
    /// Returns the number of bytes written.
    async fn fetch(&self, url: &Url, dest: &Path) -> Result<u64, FetchError>;
}

/// Fetcher backed by a shared `reqwest` client.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a new HTTP fetcher with the given configuration.
    pub fn new(config: &DownloaderConfig) -> Result<Self, FetchError> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;
        Ok(Self { client })
    }

    /// Creates a fetcher with default configuration.
    pub fn with_defaults() -> Result<Self, FetchError> {
        Self::new(&DownloaderConfig::default())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, url: &Url, dest: &Path) -> Result<u64, FetchError> {
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let io_err = |source| FetchError::Io {
            path: dest.to_path_buf(),
            source,
        };

        let file = File::create(dest).await.map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        let mut total_bytes = 0u64;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?
        {
            writer.write_all(&chunk).await.map_err(io_err)?;
            total_bytes += chunk.len() as u64;
        }

        writer.flush().await.map_err(io_err)?;

        debug!(url = %url, bytes = total_bytes, "Fetched file");
        Ok(total_bytes)
    }
}
