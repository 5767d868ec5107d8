//! Process-wide pause barrier for backend throttling.
//!
//! A 429 anywhere must back off every in-flight worker for the same job until
//! the window passes, without each worker re-arming the full timer. The
//! barrier is a single forward-only deadline: `trigger_pause` can extend it,
//! never shorten it, and all waiters sleep against the same instant.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use crate::metrics::names;

/// Shared pause barrier. One per job scope; the deployment runs one job per
/// process, so in production this is effectively process-wide.
#[derive(Debug)]
pub struct RateLimitController {
    pause_until: Mutex<Option<Instant>>,
    pause: Duration,
}

impl RateLimitController {
    pub fn new(pause: Duration) -> Self {
        Self {
            pause_until: Mutex::new(None),
            pause,
        }
    }

    /// Block until the pause window has passed. Re-checks after waking in
    /// case another worker extended the deadline mid-sleep.
    pub async fn wait_if_paused(&self) {
        loop {
            let deadline = *self.pause_until.lock().expect("pause mutex poisoned");
            match deadline {
                Some(until) if until > Instant::now() => {
                    tokio::time::sleep_until(until).await;
                }
                _ => return,
            }
        }
    }

    /// Arm (or extend) the pause window. The deadline only moves forward.
    pub fn trigger_pause(&self, label: &str) {
        let mut guard = self.pause_until.lock().expect("pause mutex poisoned");
        let candidate = Instant::now() + self.pause;
        let extended = match *guard {
            Some(current) if current >= candidate => false,
            _ => {
                *guard = Some(candidate);
                true
            }
        };
        drop(guard);

        if extended {
            warn!(
                label,
                pause_secs = self.pause.as_secs(),
                "Backend throttled; pausing all inference workers"
            );
            metrics::counter!(names::RATE_LIMIT_PAUSES_TOTAL).increment(1);
        }
    }

    /// Whether a pause window is currently active.
    pub fn is_paused(&self) -> bool {
        matches!(
            *self.pause_until.lock().expect("pause mutex poisoned"),
            Some(until) if until > Instant::now()
        )
    }
}
