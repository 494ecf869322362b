//! HTTP utilities for the compliance service's REST API

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Header carrying the concurrency token on read responses.
const ETAG_HEADER: &str = "ETag";

/// Header carrying the expected concurrency token on replace requests.
const IF_MATCH_HEADER: &str = "If-Match";

/// Header correlating a request with the service's own diagnostics.
const CORRELATION_HEADER: &str = "X-Correlation-Id";

/// Sanitize response body for logging
/// Truncates long responses and masks non-printable characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        // Cut on a char boundary; a multi-byte character may straddle the limit.
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!(
            "{}... [truncated, {} bytes total]",
            &body[..end],
            body.len()
        )
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// A successful read response: parsed body plus the concurrency token header.
pub struct ApiResponse {
    pub body: Value,
    pub etag: Option<String>,
}

/// HTTP client wrapper for compliance API calls
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("rulectl/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Make a GET request. Returns `None` on 404 so callers can treat a
    /// vanished resource as gone rather than as a failure.
    pub async fn get(&self, url: &str, token: &str) -> Result<Option<ApiResponse>> {
        let correlation_id = uuid::Uuid::new_v4().to_string();
        tracing::debug!("GET {} [{}]", url, correlation_id);

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .header(CORRELATION_HEADER, &correlation_id)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!("GET {} returned 404", url);
            return Ok(None);
        }

        let etag = response
            .headers()
            .get(ETAG_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(anyhow::anyhow!("API request failed: {}", status));
        }

        let body = serde_json::from_str(&body).context("Failed to parse response JSON")?;
        Ok(Some(ApiResponse { body, etag }))
    }

    /// Make a POST request with a JSON body
    pub async fn post(&self, url: &str, token: &str, body: &Value) -> Result<Value> {
        let correlation_id = uuid::Uuid::new_v4().to_string();
        tracing::debug!("POST {} [{}]", url, correlation_id);

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .header(CORRELATION_HEADER, &correlation_id)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::read_success_body(response).await
    }

    /// Make a PUT request carrying the concurrency token. The service rejects
    /// a stale or missing token with a conflict status; that surfaces here as
    /// an error like any other non-2xx.
    pub async fn put(&self, url: &str, token: &str, if_match: &str, body: &Value) -> Result<Value> {
        let correlation_id = uuid::Uuid::new_v4().to_string();
        tracing::debug!("PUT {} [{}]", url, correlation_id);

        let response = self
            .client
            .put(url)
            .bearer_auth(token)
            .header(CORRELATION_HEADER, &correlation_id)
            .header(IF_MATCH_HEADER, if_match)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::read_success_body(response).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, url: &str, token: &str) -> Result<Value> {
        let correlation_id = uuid::Uuid::new_v4().to_string();
        tracing::debug!("DELETE {} [{}]", url, correlation_id);

        let response = self
            .client
            .delete(url)
            .bearer_auth(token)
            .header(CORRELATION_HEADER, &correlation_id)
            .send()
            .await
            .context("Failed to send request")?;

        Self::read_success_body(response).await
    }

    async fn read_success_body(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(anyhow::anyhow!("API request failed: {}", status));
        }

        // Handle empty response
        if body.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).context("Failed to parse response JSON")
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new().expect("Failed to create default HTTP client")
    }
}

/// Format an API error for display
/// Security: Sanitizes error messages to avoid leaking sensitive API details
pub fn format_api_error(error: &anyhow::Error) -> String {
    let error_str = error.to_string();

    if error_str.contains("403") {
        return "Permission denied. Check your service access policies.".to_string();
    }
    if error_str.contains("401") {
        return "Authentication failed. Set RULECTL_API_KEY to a valid key.".to_string();
    }
    if error_str.contains("404") {
        return "Resource not found.".to_string();
    }
    if error_str.contains("409") || error_str.contains("412") {
        return "Concurrency conflict. Re-read the rule to refresh its etag and try again."
            .to_string();
    }
    if error_str.contains("429") {
        return "Rate limit exceeded. Please try again later.".to_string();
    }
    if error_str.contains("400") {
        return "Invalid request. Check your rule definition.".to_string();
    }
    if error_str.contains("500") || error_str.contains("503") {
        return "Service temporarily unavailable. Please try again.".to_string();
    }

    if error_str.contains("API request failed") {
        return "Request failed. Check your network connection and try again.".to_string();
    }

    // Truncate long error messages and remove potential sensitive data
    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(80)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}
