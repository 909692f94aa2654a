//! Retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use crate::error::WeaveError;

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
    /// HTTP statuses worth retrying. Empty means "whatever the error says".
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            multiplier: 7.0,
            retry_statuses: vec![429, 500, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Whether `error` should be retried under this policy.
    pub fn should_retry(&self, error: &WeaveError) -> bool {
        match error.status() {
            Some(status) if !self.retry_statuses.is_empty() => {
                self.retry_statuses.contains(&status)
            }
            _ => error.is_retryable(),
        }
    }

    /// Execute an async operation with retry.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, WeaveError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, WeaveError>>,
    {
        let mut backoff = self.initial_backoff;
        let mut last_error = None;

        for attempt in 0..self.max_attempts.max(1) {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !self.should_retry(&e) || attempt + 1 >= self.max_attempts {
                        return Err(e);
                    }

                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Retrying after error"
                    );

                    let sleep_duration = match &e {
                        WeaveError::RateLimited {
                            retry_after_ms: Some(ms),
                        } => Duration::from_millis(*ms).min(self.max_backoff),
                        _ => {
                            // Jitter: 75%–125% of backoff
                            let jitter_factor = 0.75 + (rand_factor() * 0.5);
                            Duration::from_secs_f64(backoff.as_secs_f64() * jitter_factor)
                        }
                    };
                    tokio::time::sleep(sleep_duration).await;

                    backoff = Duration::from_secs_f64(
                        (backoff.as_secs_f64() * self.multiplier).min(self.max_backoff.as_secs_f64()),
                    );

                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(WeaveError::Timeout(0)))
    }
}

/// Simple pseudo-random factor [0, 1) without pulling in rand crate.
fn rand_factor() -> f64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .hash(&mut hasher);
    std::thread::current().id().hash(&mut hasher);

    let hash = hasher.finish();
    (hash % 10000) as f64 / 10000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_statuses_override_default_classification() {
        let policy = RetryPolicy::default();

        assert!(policy.should_retry(&WeaveError::upstream_status("gemini", 503, "busy")));
        assert!(!policy.should_retry(&WeaveError::upstream_status("gemini", 502, "bad gateway")));
        assert!(!policy.should_retry(&WeaveError::upstream_status("gemini", 400, "bad request")));
        assert!(policy.should_retry(&WeaveError::Timeout(10)));
    }

    #[test]
    fn none_makes_a_single_attempt() {
        assert_eq!(RetryPolicy::none().max_attempts, 1);
    }
}
