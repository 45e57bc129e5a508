use crate::session::{SessionMetadata, SessionResult};
use crate::settings::{Language, ModeKind};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("invalid response body: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Errors that may go away when the same request is sent again
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for TransportError {
    // Only failures to reach the server are retried; an HTTP error response
    // is final.
    fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Network(_))
    }
}

/// Bounded exponential backoff: `base_delay`, then doubled per retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of retries.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    E: Retryable + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut retry = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && retry < policy.max_retries => {
                let delay = policy.delay_for(retry);
                retry += 1;
                warn!(
                    attempt = retry,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "request failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// One practice text served by the remote text catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextItem {
    pub content: String,
    #[serde(default)]
    pub order: i32,
}

impl TextItem {
    pub fn new(content: impl Into<String>, order: i32) -> Self {
        Self {
            content: content.into(),
            order,
        }
    }
}

/// Body of a session save request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub mode: ModeKind,
    pub language: String,
    pub text_content: String,
    pub duration_ms: u64,
    pub input_length: usize,
    pub correct_length: usize,
    pub error_count: usize,
    pub accuracy: u32,
    pub wpm: u32,
    pub cpm: u32,
    pub metadata: SessionMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_session_id: Option<String>,
}

impl SessionRecord {
    pub fn from_result(result: &SessionResult, guest_session_id: Option<String>) -> Self {
        let stats = &result.stats;
        Self {
            mode: result.mode,
            language: result.language.api_code().to_string(),
            text_content: result.text.clone(),
            duration_ms: stats.duration_ms(),
            input_length: stats.total_chars,
            correct_length: stats.correct_chars,
            error_count: stats.errors,
            accuracy: stats.accuracy,
            wpm: stats.wpm,
            cpm: stats.cpm(),
            metadata: result.metadata.clone(),
            guest_session_id,
        }
    }
}

/// A session as stored by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSession {
    pub id: i64,
    pub mode: String,
    pub language: String,
    #[serde(default)]
    pub text_content: String,
    #[serde(deserialize_with = "number_or_string")]
    pub wpm: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub accuracy: f64,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub started_at: Option<String>,
}

// Decimal fields arrive as strings ("80.00") from the server
fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Remote destination for finished sessions
#[allow(async_fn_in_trait)]
pub trait SessionStore {
    async fn save_session(&self, record: &SessionRecord) -> Result<SavedSession, TransportError>;
}

/// Remote catalog of practice texts
#[allow(async_fn_in_trait)]
pub trait TextSource {
    async fn fetch_items(&self, language: Language) -> Result<Vec<TextItem>, TransportError>;
}

/// JSON client for the practice API
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, TransportError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            retry,
        })
    }

    pub fn from_config(config: &crate::config::Config) -> Result<Self, TransportError> {
        Self::new(
            config.api_base_url.clone(),
            config.request_timeout(),
            config.retry_policy(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), endpoint)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, TransportError> {
        let url = self.url(endpoint);
        self.send(|| self.http.get(&url).query(params)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, TransportError> {
        let url = self.url(endpoint);
        self.send(|| self.http.post(&url).json(body)).await
    }

    async fn send<T, F>(&self, build: F) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let build = &build;
        with_retry(&self.retry, move || async move {
            let response = build().send().await?;
            decode(response).await
        })
        .await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let status = response.status();
    if !status.is_success() {
        let detail = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| body.get("detail")?.as_str().map(str::to_string))
            .unwrap_or_else(|| format!("HTTP Error: {}", status.as_u16()));
        return Err(TransportError::Status {
            status: status.as_u16(),
            detail,
        });
    }

    response.json::<T>().await.map_err(TransportError::Decode)
}

impl SessionStore for ApiClient {
    async fn save_session(&self, record: &SessionRecord) -> Result<SavedSession, TransportError> {
        self.post("/sessions/", record).await
    }
}

impl TextSource for ApiClient {
    async fn fetch_items(&self, language: Language) -> Result<Vec<TextItem>, TransportError> {
        self.get("/texts/items/", &[("language", language.api_code())])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug)]
    struct FlakyError(bool);

    impl Display for FlakyError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky (retryable: {})", self.0)
        }
    }

    impl Retryable for FlakyError {
        fn is_retryable(&self) -> bool {
            self.0
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn delays_double_per_retry() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn retry_succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result: Result<u32, FlakyError> = with_retry(&fast_policy(3), || {
            calls.set(calls.get() + 1);
            let attempt = calls.get();
            async move {
                if attempt < 3 {
                    Err(FlakyError(true))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn retry_gives_up_after_max_retries() {
        let calls = Cell::new(0);
        let result: Result<(), FlakyError> = with_retry(&fast_policy(3), || {
            calls.set(calls.get() + 1);
            async { Err(FlakyError(true)) }
        })
        .await;

        assert!(result.is_err());
        // the first attempt plus three retries
        assert_eq!(calls.get(), 4);
    }

    #[tokio::test]
    async fn non_retryable_errors_fail_immediately() {
        let calls = Cell::new(0);
        let result: Result<(), FlakyError> = with_retry(&fast_policy(3), || {
            calls.set(calls.get() + 1);
            async { Err(FlakyError(false)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn status_errors_are_not_retryable() {
        let err = TransportError::Status {
            status: 500,
            detail: "boom".into(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "HTTP error 500: boom");
    }

    #[test]
    fn saved_session_accepts_decimal_strings() {
        let saved: SavedSession = serde_json::from_str(
            r#"{"id": 7, "mode": "sentence", "language": "ko", "text_content": "abc",
                "wpm": "80.00", "accuracy": 97.5, "duration_ms": 1200,
                "started_at": "2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(saved.id, 7);
        assert_eq!(saved.wpm, 80.0);
        assert_eq!(saved.accuracy, 97.5);
    }

    #[test]
    fn url_joins_without_double_slash() {
        let client =
            ApiClient::new("http://example.test/api/", Duration::from_secs(1), fast_policy(0))
                .unwrap();
        assert_eq!(client.url("/sessions/"), "http://example.test/api/sessions/");
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        // nothing listens on the discard port locally
        let client = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(2), fast_policy(1))
            .unwrap();
        let err = client.fetch_items(Language::English).await.unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn http_error_is_returned_without_retry() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let server_hits = hits.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                server_hits.fetch_add(1, Ordering::SeqCst);
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let body = r#"{"detail":"nope"}"#;
                let response = format!(
                    "HTTP/1.1 500 Internal Server Error\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        let client =
            ApiClient::new(format!("http://{addr}"), Duration::from_secs(2), fast_policy(3))
                .unwrap();
        let err = client.fetch_items(Language::English).await.unwrap_err();
        assert!(
            matches!(err, TransportError::Status { status: 500, ref detail } if detail == "nope"),
            "unexpected error: {err}"
        );
        assert!(!err.is_retryable());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
