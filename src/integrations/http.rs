use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::error::{AppError, Result};

/// Failure of a single provider call. Never escapes the chain it belongs to.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("no data: {0}")]
    NoData(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("all strategies failed: {0}")]
    AllStrategiesFailed(String),
}

impl ProviderError {
    /// Rate limits are the only condition worth retrying against the same
    /// endpoint.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::RateLimited(_) => true,
            ProviderError::Rpc { message, .. } => looks_like_rate_limit(message),
            _ => false,
        }
    }

    /// "Nothing here for this shape", as opposed to a broken provider.
    pub fn is_absent(&self) -> bool {
        matches!(self, ProviderError::NotFound(_) | ProviderError::NoData(_))
    }
}

// Internal helper that supports `looks_like_rate_limit` operations.
pub fn looks_like_rate_limit(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("rate limit")
        || lower.contains("ratelimit")
        || lower.contains("too many requests")
        || lower.contains("429")
        || lower.contains("max calls per sec")
        || lower.contains("throttle")
}

pub(crate) fn rpc_request(method: &str, params: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1
    })
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Outbound HTTP shared by every adapter. Each request inherits the client
/// timeout, so a stalled provider turns into `ProviderError::Timeout`.
#[derive(Clone, Debug)]
pub struct ProviderHttp {
    client: Client,
}

impl ProviderHttp {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(4)))
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> std::result::Result<T, ProviderError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request.send().await.map_err(|e| map_transport_error(url, e))?;
        decode_response(url, response).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> std::result::Result<T, ProviderError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| map_transport_error(url, e))?;
        decode_response(url, response).await
    }

    /// JSON-RPC 2.0 call; rate-limit-shaped error bodies become
    /// `ProviderError::RateLimited`.
    pub async fn rpc_call<T: DeserializeOwned>(
        &self,
        url: &str,
        method: &str,
        params: serde_json::Value,
    ) -> std::result::Result<T, ProviderError> {
        let request = rpc_request(method, params);
        let envelope: RpcEnvelope<T> = self.post_json(url, &request).await?;
        if let Some(err) = envelope.error {
            if err.code == 429 || looks_like_rate_limit(&err.message) {
                return Err(ProviderError::RateLimited(format!("{}: {}", method, err.message)));
            }
            return Err(ProviderError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        envelope
            .result
            .ok_or_else(|| ProviderError::Decode(format!("{} returned no result", method)))
    }
}

// Internal helper that parses or transforms values for `map_transport_error`.
fn map_transport_error(url: &str, err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(url.to_string())
    } else {
        ProviderError::Transport(err.to_string())
    }
}

/// Maps a status code to the provider taxonomy; `None` means success.
pub(crate) fn classify_status(url: &str, status: StatusCode, body: &str) -> Option<ProviderError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Some(ProviderError::RateLimited(compact_body(body)));
    }
    if status == StatusCode::NOT_FOUND {
        return Some(ProviderError::NotFound(url.to_string()));
    }
    if !status.is_success() {
        if looks_like_rate_limit(body) {
            return Some(ProviderError::RateLimited(compact_body(body)));
        }
        return Some(ProviderError::Http {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    None
}

// Internal helper that fetches data for `decode_response`.
async fn decode_response<T: DeserializeOwned>(
    url: &str,
    response: Response,
) -> std::result::Result<T, ProviderError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| map_transport_error(url, e))?;
    if let Some(err) = classify_status(url, status, &body) {
        return Err(err);
    }
    serde_json::from_str::<T>(&body).map_err(|e| ProviderError::Decode(format!("{}: {}", url, e)))
}

// Internal helper that parses or transforms values for `compact_body`.
fn compact_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty body".to_string();
    }
    trimmed.chars().take(160).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_request_sets_method_and_id() {
        let req = rpc_request("platform.getBalance", serde_json::json!({ "addresses": [] }));
        assert_eq!(req.get("method").and_then(|v| v.as_str()), Some("platform.getBalance"));
        assert_eq!(req.get("jsonrpc").and_then(|v| v.as_str()), Some("2.0"));
        assert_eq!(req.get("id").and_then(|v| v.as_i64()), Some(1));
    }

    #[test]
    fn status_classification_separates_absent_from_throttled() {
        let throttled = classify_status("u", StatusCode::TOO_MANY_REQUESTS, "");
        assert!(matches!(throttled, Some(ProviderError::RateLimited(_))));

        let missing = classify_status("u", StatusCode::NOT_FOUND, "");
        assert!(matches!(missing, Some(ProviderError::NotFound(_))));
        assert!(missing.map(|e| e.is_absent()).unwrap_or(false));

        let broken = classify_status("u", StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(broken, Some(ProviderError::Http { status: 502, .. })));

        let shaped = classify_status("u", StatusCode::FORBIDDEN, "Rate limit exceeded");
        assert!(matches!(shaped, Some(ProviderError::RateLimited(_))));

        assert!(classify_status("u", StatusCode::OK, "{}").is_none());
    }

    #[test]
    fn retryable_covers_rate_limited_rpc_errors() {
        assert!(ProviderError::RateLimited("x".into()).is_retryable());
        assert!(ProviderError::Rpc {
            code: -32000,
            message: "too many requests".into()
        }
        .is_retryable());
        assert!(!ProviderError::Rpc {
            code: -32602,
            message: "invalid params".into()
        }
        .is_retryable());
        assert!(!ProviderError::Timeout("u".into()).is_retryable());
    }
}
