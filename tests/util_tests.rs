//! Tests for utility modules (retry, timeout).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agentweave::error::WeaveError;
use agentweave::util::retry::RetryPolicy;
use agentweave::util::timeout::with_timeout;

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(100),
        max_backoff: Duration::from_millis(100),
        multiplier: 2.0,
        retry_statuses: vec![429, 500, 503, 504],
    }
}

#[tokio::test(start_paused = true)]
async fn retry_policy_retries_retryable_errors_until_success() {
    let policy = fast_policy(4);
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_for_task = attempts.clone();

    let task = tokio::spawn(async move {
        policy
            .execute(|| {
                let attempts = attempts_for_task.clone();
                async move {
                    let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                    if attempt < 2 {
                        Err(WeaveError::upstream_status("gemini", 503, "busy"))
                    } else {
                        Ok::<_, WeaveError>("ok")
                    }
                }
            })
            .await
    });

    tokio::task::yield_now().await;
    tokio::time::advance(Duration::from_secs(1)).await;
    let result = task.await.unwrap();

    assert_eq!(result.unwrap(), "ok");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retry_policy_stops_immediately_for_unlisted_statuses() {
    let policy = fast_policy(5);
    let attempts = Arc::new(AtomicUsize::new(0));

    let result = policy
        .execute(|| {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(WeaveError::upstream_status("gemini", 502, "bad gateway"))
            }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn retry_policy_gives_up_after_max_attempts() {
    let policy = fast_policy(3);
    let attempts = Arc::new(AtomicUsize::new(0));

    let result = policy
        .execute(|| {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(WeaveError::Timeout(50))
            }
        })
        .await;

    assert!(matches!(result, Err(WeaveError::Timeout(50))));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_hint_sets_the_delay() {
    let policy = RetryPolicy {
        max_backoff: Duration::from_secs(60),
        ..fast_policy(2)
    };
    let started = tokio::time::Instant::now();
    let attempts = Arc::new(AtomicUsize::new(0));

    let result = policy
        .execute(|| {
            let attempts = attempts.clone();
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(WeaveError::RateLimited {
                        retry_after_ms: Some(5_000),
                    })
                } else {
                    Ok(())
                }
            }
        })
        .await;

    assert!(result.is_ok());
    assert!(started.elapsed() >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn with_timeout_reports_elapsed_budget() {
    let result = with_timeout(Duration::from_millis(250), async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok::<_, WeaveError>(())
    })
    .await;

    assert!(matches!(result, Err(WeaveError::Timeout(250))));
}
