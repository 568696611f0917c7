//! HTTP utilities for GCP REST API calls

use crate::error::{DeployError, Result};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips non-printable characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for GCP API calls
#[derive(Clone)]
pub struct GcpHttpClient {
    client: Client,
}

impl GcpHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("gcp-deploy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| DeployError::Transport {
                url: String::new(),
                source,
            })?;

        Ok(Self { client })
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str, token: &str) -> Result<Value> {
        tracing::debug!("GET {}", url);
        self.send(url, self.client.get(url).bearer_auth(token)).await
    }

    /// Make a POST request to a GCP API
    pub async fn post(&self, url: &str, token: &str, body: Option<&Value>) -> Result<Value> {
        tracing::debug!("POST {}", url);

        let mut request = self.client.post(url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        self.send(url, request).await
    }

    /// Make a DELETE request to a GCP API
    pub async fn delete(&self, url: &str, token: &str) -> Result<Value> {
        tracing::debug!("DELETE {}", url);
        self.send(url, self.client.delete(url).bearer_auth(token)).await
    }

    async fn send(&self, url: &str, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await.map_err(|source| DeployError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|source| DeployError::Transport {
            url: url.to_string(),
            source,
        })?;

        if !status.is_success() {
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(api_error(status.as_u16(), &body));
        }

        if body.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| DeployError::malformed(url, e.to_string()))
    }
}

/// Build an API error from a non-2xx response, keeping the provider's
/// structured detail when the body carries one
pub fn api_error(status: u16, body: &str) -> DeployError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));

    let message = error
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| {
            if body.is_empty() {
                "API request failed".to_string()
            } else {
                sanitize_for_log(body)
            }
        });

    let details = error
        .and_then(|e| e.get("errors"))
        .and_then(|e| e.as_array())
        .map(|errors| {
            errors
                .iter()
                .map(|item| match (item.get("reason"), item.get("message")) {
                    (Some(reason), Some(msg)) => format!(
                        "{}: {}",
                        reason.as_str().unwrap_or_default(),
                        msg.as_str().unwrap_or_default()
                    ),
                    _ => item.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    DeployError::Api {
        status,
        message,
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_truncates() {
        let body = "x".repeat(500);
        let out = sanitize_for_log(&body);
        assert!(out.starts_with(&"x".repeat(200)));
        assert!(out.contains("500 bytes total"));
    }

    #[test]
    fn test_api_error_structured() {
        let body = r#"{"error": {"code": 409, "message": "The resource 'api-1-0-0' already exists",
            "errors": [{"reason": "alreadyExists", "message": "exists", "domain": "global"}]}}"#;
        match api_error(409, body) {
            DeployError::Api {
                status,
                message,
                details,
            } => {
                assert_eq!(status, 409);
                assert_eq!(message, "The resource 'api-1-0-0' already exists");
                assert_eq!(details, vec!["alreadyExists: exists".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_api_error_raw_body() {
        match api_error(502, "Bad Gateway") {
            DeployError::Api { message, details, .. } => {
                assert_eq!(message, "Bad Gateway");
                assert!(details.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
