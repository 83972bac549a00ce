//! Mock fetcher for testing.

use async_trait::async_trait;
use reqwest::Url;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::archive::{FetchError, Fetcher};

/// Scripted behavior for one URL.
#[derive(Debug, Default)]
struct UrlScript {
    body: Option<Vec<u8>>,
    delay: Option<Duration>,
    /// Remaining failures before success. `None` with `error` set means forever.
    failures_left: Option<u32>,
    error: Option<FetchError>,
    attempts: u32,
}

#[derive(Debug, Default)]
struct MockState {
    scripts: HashMap<String, UrlScript>,
    calls: Vec<String>,
    completions: Vec<String>,
}

/// Mock implementation of the Fetcher trait.
///
/// Provides controllable behavior for testing:
/// - Per-URL response bodies and latencies
/// - Permanent or transient failures
/// - Recorded call and completion order
///
/// Unknown URLs succeed with a body derived from the URL.
///
/// # Example
///
/// ```rust,ignore
/// use zipper_core::testing::MockFetcher;
///
/// let fetcher = MockFetcher::new();
/// fetcher.set_delay("https://files.test/a.pdf", Duration::from_millis(50));
/// fetcher.fail_always("https://files.test/b.pdf", FetchError::Status(404));
///
/// // Run the pipeline...
/// assert_eq!(fetcher.attempts("https://files.test/b.pdf"), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockFetcher {
    state: Arc<Mutex<MockState>>,
}

impl MockFetcher {
    /// Create a new mock fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serve `body` for `url`.
    pub fn set_body(&self, url: &str, body: impl Into<Vec<u8>>) {
        self.lock().scripts.entry(url.to_string()).or_default().body = Some(body.into());
    }

    /// Wait `delay` before answering each request for `url`.
    pub fn set_delay(&self, url: &str, delay: Duration) {
        self.lock().scripts.entry(url.to_string()).or_default().delay = Some(delay);
    }

    /// Every request for `url` fails with `error`.
    pub fn fail_always(&self, url: &str, error: FetchError) {
        let mut state = self.lock();
        let script = state.scripts.entry(url.to_string()).or_default();
        script.error = Some(error);
        script.failures_left = None;
    }

    /// The first `times` requests for `url` fail with `error`, then it succeeds.
    pub fn fail_times(&self, url: &str, times: u32, error: FetchError) {
        let mut state = self.lock();
        let script = state.scripts.entry(url.to_string()).or_default();
        script.error = Some(error);
        script.failures_left = Some(times);
    }

    /// Number of fetch attempts made for `url`.
    pub fn attempts(&self, url: &str) -> u32 {
        self.lock().scripts.get(url).map(|s| s.attempts).unwrap_or(0)
    }

    /// URLs in the order fetch was called (one entry per attempt).
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// URLs in the order their successful fetch finished.
    pub fn completions(&self) -> Vec<String> {
        self.lock().completions.clone()
    }

    /// Decide the outcome of one attempt under the lock.
    fn next_outcome(&self, url: &str) -> (Option<Duration>, Result<Vec<u8>, FetchError>) {
        let mut state = self.lock();
        state.calls.push(url.to_string());
        let script = state.scripts.entry(url.to_string()).or_default();
        script.attempts += 1;

        let fail = match (&script.error, script.failures_left) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(_), Some(0)) => false,
            (Some(_), Some(n)) => {
                script.failures_left = Some(n - 1);
                true
            }
        };

        let outcome = match (&script.error, fail) {
            (Some(error), true) => Err(clone_error(error)),
            _ => Ok(script
                .body
                .clone()
                .unwrap_or_else(|| format!("content of {url}").into_bytes())),
        };
        (script.delay, outcome)
    }
}

/// `FetchError` holds an `io::Error`, so it is not `Clone`.
fn clone_error(error: &FetchError) -> FetchError {
    match error {
        FetchError::InvalidUrl { url, reason } => FetchError::InvalidUrl {
            url: url.clone(),
            reason: reason.clone(),
        },
        FetchError::MissingFileName { url } => FetchError::MissingFileName { url: url.clone() },
        FetchError::Request(msg) => FetchError::Request(msg.clone()),
        FetchError::Status(code) => FetchError::Status(*code),
        FetchError::Io { path, source } => FetchError::Io {
            path: path.clone(),
            source: std::io::Error::new(source.kind(), source.to_string()),
        },
        FetchError::Exhausted { attempts, last } => FetchError::Exhausted {
            attempts: *attempts,
            last: Box::new(clone_error(last)),
        },
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, url: &Url, dest: &Path) -> Result<u64, FetchError> {
        let key = url.as_str();
        let (delay, outcome) = self.next_outcome(key);

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let body = outcome?;
        tokio::fs::write(dest, &body)
            .await
            .map_err(|source| FetchError::Io {
                path: dest.to_path_buf(),
                source,
            })?;

        self.lock().completions.push(key.to_string());
        Ok(body.len() as u64)
    }
}
