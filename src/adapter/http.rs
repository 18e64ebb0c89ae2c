//! Shared HTTP client, request building, and status mapping.

use std::sync::OnceLock;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};

use crate::config::BackendConfig;
use crate::error::{ErrorCode, ErrorDetails, ParleyError, Result};
use crate::util::timeout::with_timeout;

/// Markers of a billing failure reported inside a 2xx body.
const BILLING_MARKERS: &[&str] = &["unpaid bills", "code\":4027"];

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
///
/// Timeouts are applied per call from [`BackendConfig::timeout`].
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to build HTTP client")
    })
}

/// JSON headers plus everything configured on the backend.
pub fn backend_headers(config: &BackendConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/event-stream"),
    );
    for (name, value) in &config.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "skipping invalid backend header"),
        }
    }
    headers
}

/// Map a non-2xx status to an error.
pub fn status_to_error(status: u16, body: &str) -> ParleyError {
    match status {
        401 | 403 => ParleyError::Authentication(format!(
            "backend rejected credentials ({status}): {}",
            crate::error::truncate_body(body)
        )),
        429 => ParleyError::RateLimited {
            retry_after_ms: extract_retry_after(body),
        },
        _ => ParleyError::api(status, body),
    }
}

fn extract_retry_after(body: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}

/// A 2xx body that actually reports an unpaid account.
pub fn billing_failure(body: &str) -> Option<ParleyError> {
    let compact = body.replace("\": ", "\":");
    if !BILLING_MARKERS.iter().any(|marker| compact.contains(marker)) {
        return None;
    }
    Some(ParleyError::api_with_details(
        402,
        body,
        ErrorDetails {
            code: Some(ErrorCode::InsufficientQuota),
            provider_code: compact.contains("code\":4027").then(|| "4027".to_string()),
            param: None,
            request_id: None,
        },
    ))
}

/// A successful response, fully read.
#[derive(Debug)]
pub struct HttpReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpReply {
    pub fn is_event_stream(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/event-stream"))
    }
}

/// Send a request and read the whole body within the backend timeout.
///
/// Non-2xx statuses become errors; a 2xx body is returned as-is.
pub async fn execute(config: &BackendConfig, request: reqwest::RequestBuilder) -> Result<HttpReply> {
    with_timeout(config.timeout, async {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        if !(200..300).contains(&status) {
            tracing::debug!(status, endpoint = %config.endpoint, "backend returned an error status");
            return Err(status_to_error(status, &body));
        }
        Ok(HttpReply {
            status,
            content_type,
            body,
        })
    })
    .await
}

/// Parse the configured method, defaulting to POST.
pub fn method(config: &BackendConfig) -> Result<reqwest::Method> {
    reqwest::Method::from_bytes(config.method.to_ascii_uppercase().as_bytes())
        .map_err(|_| ParleyError::Configuration(format!("invalid method '{}'", config.method)))
}
