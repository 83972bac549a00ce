//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with a mock fetcher injected, so the whole task lifecycle can be driven
//! over HTTP without network access.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use zipper_core::{testing::MockFetcher, Config};
use zipper_server::state::AppState;

/// Re-export fixtures for test convenience
pub use zipper_core::testing::fixtures;

/// Test fixture for API testing with a mock fetcher.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_task_creation() {
///     let fixture = TestFixture::new();
///
///     let response = fixture.post_empty("/api/v1/tasks").await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Shared state, for inspecting the task manager directly
    pub state: Arc<AppState>,
    /// Mock fetcher - configure bodies, delays and failures
    pub fetcher: MockFetcher,
    /// Temporary output and workspace directories
    pub dirs: fixtures::TestDirs,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Response with raw body and headers
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestFixture {
    /// Create a new test fixture with the default admission limit.
    pub fn new() -> Self {
        Self::with_capacity(3)
    }

    /// Create a test fixture admitting at most `max_active` tasks.
    pub fn with_capacity(max_active: usize) -> Self {
        let fetcher = MockFetcher::new();
        let (manager, dirs) = fixtures::manager_with_fetcher(max_active, fetcher.clone());

        let mut config = Config::default();
        config.task.max_concurrent = max_active;
        config.archive = dirs.config.clone();

        let state = Arc::new(AppState::new(config, manager));
        let router = zipper_server::api::create_router(Arc::clone(&state));

        Self {
            router,
            state,
            fetcher,
            dirs,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let raw = self.send(request).await;
        TestResponse {
            status: raw.status,
            body: parse_json(&raw.body),
        }
    }

    /// Send a GET request and keep the raw body and headers.
    pub async fn get_raw(&self, path: &str) -> RawResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Create a task and return its id.
    pub async fn create_task(&self) -> String {
        let response = self.post_empty("/api/v1/tasks").await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        response.body["task_id"]
            .as_str()
            .expect("task_id in response")
            .to_string()
    }

    /// Add a file URL to a task.
    pub async fn add_file(&self, task_id: &str, url: &str) -> TestResponse {
        self.post(
            &format!("/api/v1/tasks/{}/files", task_id),
            serde_json::json!({ "url": url }),
        )
        .await
    }

    /// Poll a task until it leaves `in_progress`, returning its last snapshot.
    pub async fn wait_for_terminal(&self, task_id: &str) -> Value {
        let path = format!("/api/v1/tasks/{}", task_id);
        for _ in 0..200 {
            let response = self.get(&path).await;
            if response.body["status"] != "in_progress" {
                return response.body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Task {} did not finish in time", task_id);
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let raw = self.send(request_builder.body(body).unwrap()).await;
        TestResponse {
            status: raw.status,
            body: parse_json(&raw.body),
        }
    }

    async fn send(&self, request: Request<Body>) -> RawResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        RawResponse {
            status,
            headers,
            body,
        }
    }
}

fn parse_json(bytes: &Bytes) -> Value {
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(bytes).unwrap_or(Value::Null)
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
