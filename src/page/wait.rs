//! Bounded waits
//!
//! Every wait in a test case draws from the same [`Deadline`], so a case can
//! never block for longer than its configured budget no matter how many waits
//! it chains.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

use crate::{Error, Result};

/// Budget shared by all waits of one page
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn new(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.start.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Shrink a per-call timeout so it never exceeds what is left of the budget
    pub fn clamp(&self, requested: Duration) -> Duration {
        requested.min(self.remaining())
    }
}

/// Outcome of one poll
#[derive(Debug)]
pub enum Probe<T> {
    /// Condition satisfied
    Ready(T),
    /// Not yet; carries a description of what was observed
    Pending(Option<String>),
}

/// Poll `probe` every `interval` until it is ready or `timeout` runs out.
///
/// The probe always runs at least once. Errors caused by the page navigating
/// underneath an evaluation count as "not yet"; other errors end the wait.
pub async fn poll_until<T, F, Fut>(what: &str, timeout: Duration, interval: Duration, mut probe: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Probe<T>>>,
{
    let started = Instant::now();
    let mut last_observed = None;

    loop {
        match probe().await {
            Ok(Probe::Ready(value)) => return Ok(value),
            Ok(Probe::Pending(observed)) => last_observed = observed,
            Err(e) if is_navigation_race(&e) => {
                trace!("Poll for {} hit a navigation: {}", what, e);
            }
            Err(e) => return Err(e),
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return Err(Error::timeout_with_last(what, timeout, last_observed));
        }
        tokio::time::sleep(interval.min(timeout - elapsed)).await;
    }
}

/// True for evaluation failures caused by the document being replaced mid-call
pub fn is_navigation_race(error: &Error) -> bool {
    match error {
        Error::Cdp(msg) | Error::ScriptExecutionFailed(msg) => {
            msg.contains("Execution context was destroyed")
                || msg.contains("Cannot find context with specified id")
                || msg.contains("Inspected target navigated or closed")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_ready_after_some_attempts() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);

        let value = poll_until("third attempt", Duration::from_secs(5), Duration::from_millis(100), || {
            let counter = Arc::clone(&counter);
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n >= 3 {
                    Ok(Probe::Ready(n))
                } else {
                    Ok(Probe::Pending(Some(format!("attempt {}", n))))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_times_out_with_last_observation() {
        let err = poll_until::<(), _, _>(
            "class expanded",
            Duration::from_millis(500),
            Duration::from_millis(100),
            || async { Ok(Probe::Pending(Some("collapsed".to_string()))) },
        )
        .await
        .unwrap_err();

        match err {
            Error::Timeout {
                what,
                elapsed,
                last_observed,
            } => {
                assert_eq!(what, "class expanded");
                assert_eq!(elapsed, Duration::from_millis(500));
                assert_eq!(last_observed.as_deref(), Some("collapsed"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_zero_timeout_probes_once() {
        let value = poll_until("immediate", Duration::ZERO, Duration::from_millis(100), || async {
            Ok(Probe::Ready(7))
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_tolerates_navigation_races() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);

        let value = poll_until("selector", Duration::from_secs(1), Duration::from_millis(50), || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(Error::cdp("Runtime.evaluate: Execution context was destroyed. (code: -32000)"))
                } else {
                    Ok(Probe::Ready("found"))
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(value, "found");

        let err = poll_until::<(), _, _>("selector", Duration::from_secs(1), Duration::from_millis(50), || async {
            Err(Error::websocket("Connection is not active"))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::WebSocket(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_clamps_to_remaining_budget() {
        let deadline = Deadline::new(Duration::from_secs(30));
        tokio::time::advance(Duration::from_secs(28)).await;

        assert_eq!(deadline.clamp(Duration::from_secs(5)), Duration::from_secs(2));
        assert_eq!(deadline.clamp(Duration::from_secs(1)), Duration::from_secs(1));
        assert!(!deadline.is_expired());

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(deadline.is_expired());
        assert_eq!(deadline.clamp(Duration::from_secs(5)), Duration::ZERO);
    }
}
