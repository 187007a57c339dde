//! Bounded retry with a linear countdown.
//!
//! An operation gets `max_retry` attempts. After a transient failure the
//! loop waits as many seconds as there are attempts left, so with
//! `max_retry = 4` the waits are 3, 2 and 1 seconds. A failed last attempt
//! is not followed by a wait.

use std::time::{Duration, Instant};

use tracing::{error, warn};

use crate::error::StoreError;

/// How often and for how long to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPlan {
    /// Total number of attempts (at least 1).
    pub max_retry: u32,
    /// Optional bound on the whole loop, waits included.
    pub deadline: Option<Duration>,
}

impl RetryPlan {
    pub fn new(max_retry: u32) -> Self {
        Self {
            max_retry: max_retry.max(1),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Wait before the attempt following the `attempt`-th failure (1-based),
    /// or `None` after the last attempt.
    pub fn wait_after(&self, attempt: u32) -> Option<Duration> {
        let remaining = self.max_retry.saturating_sub(attempt);
        (remaining > 0).then(|| Duration::from_secs(u64::from(remaining)))
    }
}

/// Result of a retried operation that did not hit a permanent error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    /// The operation succeeded.
    Done(T),
    /// Every attempt failed transiently; the operation was abandoned.
    Exhausted { attempts: u32 },
}

impl<T> RetryOutcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}

/// Run `op` until it succeeds, fails permanently, or the plan runs out.
///
/// Transient failures (see [`StoreError::is_transient`]) are logged at warn
/// level and retried after `sleep`. Running out of attempts is logged at
/// error level and reported as [`RetryOutcome::Exhausted`]. Any other error
/// is returned immediately.
pub fn execute_with_retry<T>(
    label: &str,
    plan: &RetryPlan,
    sleep: &mut dyn FnMut(Duration),
    mut op: impl FnMut() -> Result<T, StoreError>,
) -> Result<RetryOutcome<T>, StoreError> {
    let started = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let err = match op() {
            Ok(value) => return Ok(RetryOutcome::Done(value)),
            Err(e) if e.is_transient() => e,
            Err(e) => return Err(e),
        };

        let Some(wait) = plan.wait_after(attempt) else {
            error!(operation = label, attempts = attempt, error = %err, "{label} definitely failed");
            return Ok(RetryOutcome::Exhausted { attempts: attempt });
        };

        if let Some(deadline) = plan.deadline {
            if started.elapsed() + wait > deadline {
                error!(
                    operation = label,
                    attempts = attempt,
                    deadline_secs = deadline.as_secs(),
                    error = %err,
                    "{label} definitely failed: retry deadline reached"
                );
                return Ok(RetryOutcome::Exhausted { attempts: attempt });
            }
        }

        warn!(
            operation = label,
            attempt,
            wait_secs = wait.as_secs(),
            error = %err,
            "{label} failed. Waiting for {} sec",
            wait.as_secs()
        );
        sleep(wait);
    }
}
