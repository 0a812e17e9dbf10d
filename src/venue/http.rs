//! Shared HTTP plumbing for venue drivers

use crate::constants::MAX_RETRIES;
use crate::error::ExecError;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Build the per-driver HTTP client
pub fn build_client(timeout: Duration) -> Result<Client, ExecError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(format!("perp-exec/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ExecError::Network(e.to_string()))
}

/// Send a request, retrying transient failures with 1–3 s backoff.
///
/// The builder is cloned per attempt; bodies used here are always clonable
/// (JSON or form strings).
pub async fn send_with_retry(builder: RequestBuilder) -> Result<Response, ExecError> {
    let mut last_err = ExecError::Network("request never sent".to_string());
    for attempt in 0..MAX_RETRIES {
        let req = builder
            .try_clone()
            .ok_or_else(|| ExecError::Network("request body not clonable".to_string()))?;
        match req.send().await {
            Ok(resp) => {
                if resp.status().as_u16() == 429 {
                    last_err = ExecError::RateLimited;
                } else {
                    return Ok(resp);
                }
            }
            Err(e) => {
                let err = ExecError::Network(e.to_string());
                if !err.is_transient() {
                    return Err(err);
                }
                last_err = err;
            }
        }
        let backoff = Duration::from_secs(1 + attempt as u64);
        debug!("transient failure, retry {} in {:?}", attempt + 1, backoff);
        sleep(backoff).await;
    }
    warn!("request failed after {} attempts: {}", MAX_RETRIES, last_err);
    Err(last_err)
}

/// Read a response body as JSON, surfacing HTTP-level failures first
pub async fn json_body(resp: Response) -> Result<serde_json::Value, ExecError> {
    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| ExecError::Network(e.to_string()))?;
    if !status.is_success() {
        return Err(ExecError::Venue {
            code: status.as_u16().to_string(),
            message: text,
        });
    }
    serde_json::from_str(&text).map_err(|e| ExecError::InvalidResponse(e.to_string()))
}

/// Current UTC time in milliseconds since epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Parse a JSON value that may be a number or a numeric string
pub fn as_f64(v: &serde_json::Value) -> f64 {
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.parse::<f64>().ok()))
        .unwrap_or(0.0)
}

/// Parse a JSON value that may be an integer or a numeric string
pub fn as_i64(v: &serde_json::Value) -> i64 {
    v.as_i64()
        .or_else(|| v.as_str().and_then(|s| s.parse::<i64>().ok()))
        .unwrap_or(0)
}

/// Percent-encode and join query parameters
pub fn encode_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_as_f64_handles_strings_and_numbers() {
        assert_eq!(as_f64(&json!("3.14")), 3.14);
        assert_eq!(as_f64(&json!(2.5)), 2.5);
        assert_eq!(as_f64(&json!(null)), 0.0);
        assert_eq!(as_f64(&json!("garbage")), 0.0);
    }

    #[test]
    fn test_encode_query_escapes() {
        let q = encode_query(&[("symbol", "BTC-USDT-SWAP".to_string()), ("limit", "100".to_string())]);
        assert_eq!(q, "symbol=BTC-USDT-SWAP&limit=100");
    }
}
