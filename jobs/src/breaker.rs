//! Admission gate that refuses new work after repeated failures.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Admissions pass; failures accumulate toward the threshold.
    Closed,
    /// Admissions are refused until the recovery timeout elapses.
    Open,
    /// One probe admission passed; the next outcome decides.
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failures: u32,
    last_failure: Option<Instant>,
}

pub struct CircuitBreaker {
    threshold: u32,
    timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, timeout: Duration) -> Self {
        CircuitBreaker {
            threshold,
            timeout,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failures: 0,
                last_failure: None,
            }),
        }
    }

    /// Whether a new admission may pass right now. While Open, the first
    /// call after the recovery timeout flips to HalfOpen and passes.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let recovered = inner
                    .last_failure
                    .is_some_and(|at| at.elapsed() >= self.timeout);
                if recovered {
                    inner.state = BreakerState::HalfOpen;
                    tracing::info!("circuit breaker half-open, admitting a probe");
                }
                recovered
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != BreakerState::Closed {
            tracing::info!("circuit breaker closed");
        }
        inner.state = BreakerState::Closed;
        inner.failures = 0;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failures += 1;
        inner.last_failure = Some(Instant::now());
        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                tracing::warn!("circuit breaker re-opened from half-open");
            }
            BreakerState::Closed if inner.failures >= self.threshold => {
                inner.state = BreakerState::Open;
                metrics::counter!("jobs.breaker.opened").increment(1);
                tracing::warn!(failures = inner.failures, "circuit breaker opened");
            }
            _ => {}
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(50);

    #[test]
    fn test_opens_at_threshold() {
        let breaker = CircuitBreaker::new(3, TIMEOUT);
        assert!(breaker.allow());
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.allow());
    }

    #[test]
    fn test_half_open_after_timeout_then_closes_on_success() {
        let breaker = CircuitBreaker::new(1, TIMEOUT);
        breaker.record_failure();
        assert!(!breaker.allow());

        std::thread::sleep(TIMEOUT + Duration::from_millis(10));
        assert!(breaker.allow());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.allow());
    }

    #[test]
    fn test_half_open_reopens_on_failure() {
        let breaker = CircuitBreaker::new(1, TIMEOUT);
        breaker.record_failure();
        std::thread::sleep(TIMEOUT + Duration::from_millis(10));
        assert!(breaker.allow());

        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.allow());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let breaker = CircuitBreaker::new(2, TIMEOUT);
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        // Counter restarted after the success, so still closed.
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}
