//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock backends and a mock speech engine injected, enabling chat API
//! tests without Sonarr, Radarr or a transcription service.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use mediarequest_core::{
    load_config_from_str, ConversationEngine, MediaKind, VoiceBridge,
    testing::{MockBackend, MockTranscriber},
};

/// Re-export fixtures for test convenience
pub use mediarequest_core::testing::fixtures;

const TEST_CONFIG: &str = r#"
[server]
host = "127.0.0.1"
port = 8080

[sonarr]
url = "http://sonarr.test:8989"
api_key = "sonarr-test-key"
quality_profile_id = 1
root_folder = "/tv"

[radarr]
url = "http://radarr.test:7878"
api_key = "radarr-test-key"
quality_profile_id = 4
root_folder = "/movies"
"#;

/// Multipart boundary used by `post_multipart`.
const BOUNDARY: &str = "mediarequest-test-boundary";

/// Test fixture for E2E testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_request_movie() {
///     let fixture = TestFixture::new().await;
///     fixture.radarr.set_results(vec![fixtures::movie("Heat", 1995, 949)]).await;
///
///     let response = fixture.post("/api/v1/chats/1/messages", json!({ "text": "movie Heat" })).await;
///     assert_eq!(response.body["reply_kind"], "candidates");
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock series backend
    pub sonarr: Arc<MockBackend>,
    /// Mock movie backend
    pub radarr: Arc<MockBackend>,
    /// Mock speech engine (only wired in when voice is enabled)
    pub transcriber: Arc<MockTranscriber>,
    pub engine: Arc<ConversationEngine>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with voice disabled.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let config = load_config_from_str(TEST_CONFIG).expect("Failed to parse test config");

        let sonarr = Arc::new(MockBackend::new(MediaKind::Series));
        let radarr = Arc::new(MockBackend::new(MediaKind::Movie));
        let transcriber = Arc::new(MockTranscriber::new());

        let voice = if test_config.enable_voice {
            VoiceBridge::Available(Arc::clone(&transcriber) as Arc<dyn mediarequest_core::Transcriber>)
        } else {
            VoiceBridge::unavailable("credentials not found")
        };

        let engine = Arc::new(ConversationEngine::new(
            fixtures::resolver(Arc::clone(&sonarr), Arc::clone(&radarr)),
            voice,
            test_config.idle_timeout,
        ));

        let state = Arc::new(mediarequest_server::state::AppState::new(
            config,
            Arc::clone(&engine),
        ));
        let router = mediarequest_server::api::create_router(state);

        Self {
            router,
            sonarr,
            radarr,
            transcriber,
            engine,
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

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a chat text message and return the response.
    pub async fn say(&self, chat_id: i64, text: &str) -> TestResponse {
        self.post(
            &format!("/api/v1/chats/{}/messages", chat_id),
            serde_json::json!({ "text": text }),
        )
        .await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Send a multipart form. Each part is (name, content type, bytes).
    pub async fn post_multipart(
        &self,
        path: &str,
        parts: &[(&str, Option<&str>, &[u8])],
    ) -> TestResponse {
        let mut body = Vec::new();
        for (name, content_type, bytes) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match content_type {
                Some(ct) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}.bin\"\r\nContent-Type: {}\r\n\r\n",
                            name, name, ct
                        )
                        .as_bytes(),
                    );
                }
                None => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                }
            }
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Fetch the raw text of a non-JSON endpoint.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
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

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Wire the mock transcriber in as the voice engine
    pub enable_voice: bool,
    pub idle_timeout: Duration,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            enable_voice: false,
            idle_timeout: Duration::from_secs(300),
        }
    }
}

impl TestConfig {
    /// Create config with voice enabled.
    pub fn with_voice() -> Self {
        Self {
            enable_voice: true,
            ..Default::default()
        }
    }

    /// Create config with a short idle timeout.
    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            ..Default::default()
        }
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
