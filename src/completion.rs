//! Completion service client.
//!
//! Thin HTTP client around the remote text-completion endpoint. The wire
//! format is deliberately minimal: a prompt plus optional parameters goes
//! out, line-delimited JSON chunks come back and are accumulated into one
//! reply string. Transient failures (timeouts, 429, 5xx) are retried with
//! exponential backoff and jitter; auth failures are surfaced immediately.

use async_trait::async_trait;
use futures_util::StreamExt;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error};
use url::Url;
use uuid::Uuid;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Global retry schedule: 3 retries with exponential backoff from 1s, plus jitter.
const RETRY_BASE_DELAY_SECS: u64 = 1;
const MAX_RETRIES: usize = 3;
const RETRY_JITTER_DIVISOR: u128 = 4; // + up to 25% jitter

/// Default client version (from Cargo.toml)
const DEFAULT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Failure taxonomy for the completion service.
///
/// `is_transient` drives the retry-or-surface decision: transient errors
/// are retried up to the cap, everything else is returned to the caller.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Authentication failed (HTTP {status}). Your token may have expired or is missing.")]
    Auth { status: u16 },
    #[error("Rate limit exceeded (HTTP {status}). Please wait and try again.")]
    RateLimited { status: u16 },
    #[error("Completion service error (HTTP {status}): {body}")]
    Server { status: u16, body: String },
    #[error("Completion request timed out")]
    Timeout,
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Completion service returned an unusable response: {0}")]
    InvalidResponse(String),
    #[error("Completion service endpoint is not configured")]
    NotConfigured,
    #[error("The privacy policy does not allow sending this prompt externally")]
    PrivacyBlocked,
}

impl CompletionError {
    /// Whether retrying could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            CompletionError::RateLimited { .. }
            | CompletionError::Server { .. }
            | CompletionError::Timeout => true,
            CompletionError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Parameters for one completion call.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub stream: bool,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: None,
            temperature: None,
            model: None,
            stream: true,
        }
    }
}

/// One line of a streamed completion response.
#[derive(Debug, Deserialize)]
struct CompletionChunk {
    text: Option<String>,
}

/// The narrow seam agents call through. Fakes implement this in tests.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Send a prompt and return the accumulated reply text.
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;
}

fn is_retriable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_retriable_send_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_body()
}

fn retry_base_delay(attempt: usize) -> Duration {
    let multiplier = 1u64.checked_shl(attempt as u32).unwrap_or(u64::MAX);
    Duration::from_secs(RETRY_BASE_DELAY_SECS.saturating_mul(multiplier))
}

fn add_jitter(delay: Duration) -> Duration {
    let max_jitter_ms = delay.as_millis() / RETRY_JITTER_DIVISOR;
    if max_jitter_ms == 0 {
        return delay;
    }

    let max_jitter_ms = std::cmp::min(max_jitter_ms, u128::from(u64::MAX)) as u64;
    let jitter_ms = rand::thread_rng().gen_range(0..=max_jitter_ms);
    delay + Duration::from_millis(jitter_ms)
}

async fn send_with_retry(
    mut make_request: impl FnMut() -> reqwest::RequestBuilder,
) -> Result<reqwest::Response, CompletionError> {
    let max_attempts = MAX_RETRIES + 1;

    for attempt in 0..max_attempts {
        match make_request().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                let should_retry = is_retriable_status(status) && attempt < MAX_RETRIES;
                if should_retry {
                    let base_delay = retry_base_delay(attempt);
                    let delay = add_jitter(base_delay);
                    debug!(
                        "Completion request failed with status {}; retrying in {:?} (base {:?}, attempt {}/{})",
                        status,
                        delay,
                        base_delay,
                        attempt + 1,
                        max_attempts
                    );
                    let _ = response.bytes().await;
                    sleep(delay).await;
                    continue;
                }

                return Ok(response);
            }
            Err(err) => {
                let should_retry = is_retriable_send_error(&err) && attempt < MAX_RETRIES;
                if should_retry {
                    let base_delay = retry_base_delay(attempt);
                    let delay = add_jitter(base_delay);
                    debug!(
                        "Completion request error: {}; retrying in {:?} (base {:?}, attempt {}/{})",
                        err,
                        delay,
                        base_delay,
                        attempt + 1,
                        max_attempts
                    );
                    sleep(delay).await;
                    continue;
                }

                if err.is_timeout() {
                    return Err(CompletionError::Timeout);
                }
                return Err(CompletionError::Http(err));
            }
        }
    }

    unreachable!("send_with_retry should have returned within max_attempts")
}

/// Map a non-success response to the error taxonomy.
async fn classify_failure(response: reqwest::Response) -> CompletionError {
    let status = response.status();
    let http_status = status.as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CompletionError::Auth {
                status: http_status,
            }
        }
        StatusCode::TOO_MANY_REQUESTS => CompletionError::RateLimited {
            status: http_status,
        },
        _ => CompletionError::Server {
            status: http_status,
            body,
        },
    }
}

/// HTTP client for the completion service.
pub struct CompletionClient {
    client: Client,
    user_agent: String,
    session_id: String,
    endpoint: Url,
    api_token: Option<String>,
    model: Option<String>,
}

impl CompletionClient {
    /// Build a client against a configured endpoint.
    pub fn new(
        endpoint: &str,
        api_token: Option<String>,
        model: Option<String>,
    ) -> Result<Self, CompletionError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| CompletionError::InvalidResponse(format!("Invalid endpoint: {}", e)))?
            .join("completions")
            .map_err(|e| {
                CompletionError::InvalidResponse(format!("Failed to build endpoint URL: {}", e))
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            user_agent: format!("codemate.core/{}", DEFAULT_VERSION),
            session_id: Uuid::new_v4().to_string(),
            endpoint,
            api_token,
            model,
        })
    }
}

#[async_trait]
impl CompletionService for CompletionClient {
    async fn complete(&self, mut request: CompletionRequest) -> Result<String, CompletionError> {
        if request.model.is_none() {
            request.model = self.model.clone();
        }
        let request_id = Uuid::new_v4().to_string();

        debug!("=== Completion Request ===");
        debug!("URL: {}", self.endpoint);
        debug!("Prompt length: {}", request.prompt.len());

        let response = send_with_retry(|| {
            let mut builder = self
                .client
                .post(self.endpoint.clone())
                .header("Content-Type", "application/json")
                .header("User-Agent", &self.user_agent)
                .header("x-request-id", &request_id)
                .header("x-request-session-id", &self.session_id);

            if let Some(token) = &self.api_token {
                builder = builder.header("Authorization", format!("Bearer {}", token));
            }

            builder.json(&request)
        })
        .await?;

        let status = response.status();
        debug!("=== Completion Response ===");
        debug!("Status: {}", status);

        if !status.is_success() {
            let err = classify_failure(response).await;
            error!("Completion request failed: {}", err);
            return Err(err);
        }

        let text = collect_streamed_text(response).await?;
        if text.trim().is_empty() {
            return Err(CompletionError::InvalidResponse(
                "empty completion reply".to_string(),
            ));
        }
        Ok(text)
    }
}

/// Accumulate a line-delimited JSON chunk stream into the full reply text.
///
/// Lines that fail to parse as chunks are treated as plain text so that a
/// non-streaming deployment of the same endpoint still works.
async fn collect_streamed_text(response: reqwest::Response) -> Result<String, CompletionError> {
    let mut full_text = String::new();
    let mut stream = response.bytes_stream();
    let mut buffer = String::new();

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| {
            if e.is_timeout() {
                CompletionError::Timeout
            } else {
                CompletionError::Http(e)
            }
        })?;
        buffer.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(newline_pos) = buffer.find('\n') {
            let line = buffer[..newline_pos].trim().to_string();
            buffer = buffer[newline_pos + 1..].to_string();
            append_chunk_line(&mut full_text, &line);
        }
    }

    let rest = buffer.trim().to_string();
    if !rest.is_empty() {
        append_chunk_line(&mut full_text, &rest);
    }

    Ok(full_text)
}

fn append_chunk_line(full_text: &mut String, line: &str) {
    if line.is_empty() {
        return;
    }
    match serde_json::from_str::<CompletionChunk>(line) {
        Ok(chunk) => {
            if let Some(text) = chunk.text {
                full_text.push_str(&text);
            }
        }
        Err(_) => {
            // Plain-text response body, pass through verbatim.
            full_text.push_str(line);
            full_text.push('\n');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_base_delay_doubles() {
        assert_eq!(retry_base_delay(0), Duration::from_secs(1));
        assert_eq!(retry_base_delay(1), Duration::from_secs(2));
        assert_eq!(retry_base_delay(2), Duration::from_secs(4));
    }

    #[test]
    fn test_transient_classification() {
        assert!(CompletionError::Timeout.is_transient());
        assert!(CompletionError::RateLimited { status: 429 }.is_transient());
        assert!(CompletionError::Server {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(!CompletionError::Auth { status: 401 }.is_transient());
        assert!(!CompletionError::NotConfigured.is_transient());
    }

    #[test]
    fn test_append_chunk_line_mixes_json_and_plain() {
        let mut text = String::new();
        append_chunk_line(&mut text, r#"{"text":"hello "}"#);
        append_chunk_line(&mut text, r#"{"text":"world"}"#);
        assert_eq!(text, "hello world");

        let mut plain = String::new();
        append_chunk_line(&mut plain, "Issue: something");
        assert_eq!(plain, "Issue: something\n");
    }

    #[test]
    fn test_endpoint_join() {
        let client = CompletionClient::new("https://llm.example.com/", None, None).unwrap();
        assert_eq!(
            client.endpoint.as_str(),
            "https://llm.example.com/completions"
        );
    }
}
