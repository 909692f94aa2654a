//! Shared HTTP client construction and status mapping.

use std::time::Duration;

use crate::error::WeaveError;

/// Build a client with the given request timeout.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, WeaveError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(10)
        .build()
        .map_err(WeaveError::Network)
}

/// Map a non-success HTTP status to an error.
pub fn status_to_error(service: &str, status: u16, body: &str) -> WeaveError {
    match status {
        401 | 403 => WeaveError::Configuration(format!(
            "{service} rejected the credentials (status {status}): {}",
            error_message(body)
        )),
        429 => WeaveError::RateLimited {
            retry_after_ms: extract_retry_after(body),
        },
        _ => WeaveError::upstream_status(service, status, error_message(body)),
    }
}

/// Pull `error.message` out of a JSON error body, falling back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

fn extract_retry_after(body: &str) -> Option<u64> {
    // Gemini reports retry hints as RetryInfo details: {"retryDelay": "12s"}
    let value = serde_json::from_str::<serde_json::Value>(body).ok()?;
    let details = value.get("error")?.get("details")?.as_array()?;
    details.iter().find_map(|d| {
        let delay = d.get("retryDelay")?.as_str()?;
        let secs: f64 = delay.strip_suffix('s')?.parse().ok()?;
        Some((secs * 1000.0) as u64)
    })
}
