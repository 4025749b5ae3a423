//! Per-provider circuit breaker.
//!
//! One breaker instance guards one provider. The breaker never performs the
//! call itself; the router consults `can_execute` before each attempt and
//! reports the outcome back through `on_success`/`on_failure`.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_millis(60_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Snapshot of breaker state for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct BreakerStatus {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub last_failure: Option<Instant>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
}

/// Failure-isolation state machine.
///
/// Closed until `failure_threshold` consecutive failures, then open.
/// While open, calls are refused until `reset_timeout` has elapsed since
/// the last failure; the next `can_execute` then flips to half-open and
/// admits exactly one probe. The probe's outcome decides: success closes
/// the breaker, failure reopens it immediately.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure: None,
            }),
        }
    }

    /// Whether a call may be attempted right now.
    ///
    /// Transitions open -> half-open once the reset timeout has elapsed.
    /// In half-open, only the transitioning call is admitted; further calls
    /// are refused until the probe outcome is recorded.
    pub fn can_execute(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|at| at.elapsed() >= self.reset_timeout)
                    .unwrap_or(true);
                if elapsed {
                    inner.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => false,
        }
    }

    pub fn on_success(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
    }

    pub fn on_failure(&self) {
        let mut inner = self.lock();
        inner.last_failure = Some(Instant::now());
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = CircuitState::Open;
                }
            }
            // A failed probe reopens immediately; the count does not need
            // to re-reach the threshold.
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
            }
            // Already open: refresh the failure timestamp, nothing else.
            CircuitState::Open => {}
        }
    }

    pub fn status(&self) -> BreakerStatus {
        let inner = self.lock();
        BreakerStatus {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            last_failure: inner.last_failure,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        // State is a handful of scalars; a poisoned lock can only mean a
        // panic between plain field writes, so the data is still coherent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD, DEFAULT_RESET_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, reset_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(threshold, Duration::from_millis(reset_ms))
    }

    #[test]
    fn opens_after_threshold_failures() {
        let b = breaker(3, 60_000);
        b.on_failure();
        b.on_failure();
        assert_eq!(b.status().state, CircuitState::Closed);
        assert!(b.can_execute());

        b.on_failure();
        assert_eq!(b.status().state, CircuitState::Open);
        assert!(!b.can_execute());
    }

    #[test]
    fn success_while_closed_resets_the_counter() {
        let b = breaker(3, 60_000);
        b.on_failure();
        b.on_failure();
        b.on_success();
        assert_eq!(b.status().consecutive_failures, 0);

        // Two more intermittent failures must not open the breaker.
        b.on_failure();
        b.on_failure();
        assert_eq!(b.status().state, CircuitState::Closed);
    }

    #[test]
    fn reset_timeout_admits_exactly_one_probe() {
        let b = breaker(1, 20);
        b.on_failure();
        assert!(!b.can_execute());

        std::thread::sleep(Duration::from_millis(30));
        assert!(b.can_execute());
        assert_eq!(b.status().state, CircuitState::HalfOpen);
        // Probe already in flight; no second admission.
        assert!(!b.can_execute());
    }

    #[test]
    fn half_open_success_closes() {
        let b = breaker(1, 10);
        b.on_failure();
        std::thread::sleep(Duration::from_millis(20));
        assert!(b.can_execute());

        b.on_success();
        let status = b.status();
        assert_eq!(status.state, CircuitState::Closed);
        assert_eq!(status.consecutive_failures, 0);
        assert!(b.can_execute());
    }

    #[test]
    fn half_open_failure_reopens() {
        let b = breaker(3, 10);
        for _ in 0..3 {
            b.on_failure();
        }
        std::thread::sleep(Duration::from_millis(20));
        assert!(b.can_execute());

        // One failed probe is enough; the count does not re-accumulate.
        b.on_failure();
        assert_eq!(b.status().state, CircuitState::Open);
        assert!(!b.can_execute());
    }

    #[test]
    fn full_open_close_cycle() {
        let b = breaker(3, 50);
        for _ in 0..3 {
            b.on_failure();
        }
        assert_eq!(b.status().state, CircuitState::Open);

        // A failure while open keeps it open.
        b.on_failure();
        assert_eq!(b.status().state, CircuitState::Open);

        std::thread::sleep(Duration::from_millis(60));
        assert!(b.can_execute());
        assert_eq!(b.status().state, CircuitState::HalfOpen);

        b.on_success();
        let status = b.status();
        assert_eq!(status.state, CircuitState::Closed);
        assert_eq!(status.consecutive_failures, 0);
    }
}
