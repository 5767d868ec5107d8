//! Policy-wrapped inference calls.
//!
//! Every remote inference runs under a hard wall-time cap, a two-strike rule
//! for throttling, and a bounded transient-retry budget. A call that exhausts
//! its budget yields `SkipUnit`; the stage decides what a skipped unit means
//! (an empty segment for detection, confirmed-as-is for validation).

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use bwatch_inference::InferenceResult;

use crate::metrics::names;
use crate::rate_limit::RateLimitController;

/// Unit-level skip: the call gave up, the job goes on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipUnit {
    pub reason: String,
}

impl SkipUnit {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for SkipUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unit skipped: {}", self.reason)
    }
}

/// Per-call budget.
#[derive(Debug, Clone)]
pub struct CallPolicy {
    /// Hard wall-time cap on one attempt.
    pub call_timeout: Duration,
    /// Fixed wait between transient retries.
    pub retry_interval: Duration,
    /// Transient retries after the initial attempt.
    pub max_transient_retries: u32,
}

/// Execute one inference under the call policy.
///
/// Each attempt waits on the rate barrier first, so a pause triggered by a
/// sibling worker is honored before any work is issued. Rate-limit errors
/// trigger the global pause once; a second strike within the same call skips
/// the unit. Transient errors (5xx, "internal", "unavailable", "deadline
/// exceeded", attempt timeout) retry on a fixed interval up to the budget.
/// Anything else skips immediately.
pub async fn call_with_policy<F, Fut, T>(
    label: &str,
    controller: &RateLimitController,
    policy: &CallPolicy,
    thunk: F,
) -> Result<T, SkipUnit>
where
    F: Fn() -> Fut,
    Fut: Future<Output = InferenceResult<T>>,
{
    let mut rate_limit_strikes = 0u32;
    let mut transient_failures = 0u32;
    let mut last_error = String::new();

    loop {
        controller.wait_if_paused().await;
        metrics::counter!(names::INFERENCE_CALLS_TOTAL).increment(1);

        let error = match tokio::time::timeout(policy.call_timeout, thunk()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) if e.is_rate_limited() => {
                rate_limit_strikes += 1;
                if rate_limit_strikes >= 2 {
                    warn!(label, "Second throttle within one call, skipping unit");
                    return Err(SkipUnit::new(format!(
                        "{label}: throttled twice ({e})"
                    )));
                }
                controller.trigger_pause(label);
                continue;
            }
            Ok(Err(e)) if e.is_transient() => e.to_string(),
            Ok(Err(e)) => {
                debug!(label, error = %e, "Non-retryable inference error, skipping unit");
                return Err(SkipUnit::new(format!("{label}: {e}")));
            }
            Err(_) => format!(
                "call exceeded {}s timeout",
                policy.call_timeout.as_secs()
            ),
        };

        transient_failures += 1;
        last_error = error;
        if transient_failures > policy.max_transient_retries {
            return Err(SkipUnit::new(format!(
                "{label}: {} after {} retries",
                last_error, policy.max_transient_retries
            )));
        }

        debug!(
            label,
            attempt = transient_failures,
            error = %last_error,
            "Transient inference failure, retrying after interval"
        );
        tokio::time::sleep(policy.retry_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bwatch_inference::InferenceError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn policy() -> CallPolicy {
        CallPolicy {
            call_timeout: Duration::from_secs(120),
            retry_interval: Duration::from_secs(60),
            max_transient_retries: 3,
        }
    }

    fn controller() -> RateLimitController {
        RateLimitController::new(Duration::from_secs(300))
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_passes_through() {
        let controller = controller();
        let result = call_with_policy("unit", &controller, &policy(), || async {
            Ok::<_, InferenceError>(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_throttle_pauses_then_retries() {
        let controller = controller();
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = call_with_policy("unit", &controller, &policy(), || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(InferenceError::api(429, "RESOURCE_EXHAUSTED"))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // the retry had to sit out the global pause window
        assert!(Instant::now() - start >= Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_throttle_skips_unit() {
        let controller = controller();
        let result: Result<u32, _> = call_with_policy("unit", &controller, &policy(), || async {
            Err(InferenceError::api(429, "RESOURCE_EXHAUSTED"))
        })
        .await;

        let skip = result.unwrap_err();
        assert!(skip.reason.contains("throttled twice"));
        // the pause stays armed for sibling workers
        assert!(controller.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_retry_then_skip() {
        let controller = controller();
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<u32, _> = call_with_policy("unit", &controller, &policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(InferenceError::api(503, "UNAVAILABLE")) }
        })
        .await;

        assert!(result.unwrap_err().reason.contains("after 3 retries"));
        // initial attempt plus three retries
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_recovery() {
        let controller = controller();
        let calls = AtomicU32::new(0);

        let result = call_with_policy("unit", &controller, &policy(), || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(InferenceError::api(500, "internal"))
                } else {
                    Ok("ok")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_skip_immediately() {
        let controller = controller();
        let calls = AtomicU32::new(0);

        let result: Result<u32, _> = call_with_policy("unit", &controller, &policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(InferenceError::api(400, "invalid argument")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_transient() {
        let controller = controller();
        let calls = AtomicU32::new(0);

        let result = call_with_policy("unit", &controller, &policy(), || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    // never resolves; the policy timeout fires
                    std::future::pending::<InferenceResult<u32>>().await
                } else {
                    Ok(1)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
