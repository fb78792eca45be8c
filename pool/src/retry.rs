//! Retry-based pool variant.
//!
//! Unlike [`crate::live::LivePool`], which forgets a misbehaving endpoint
//! permanently, this pool benches it: each failure pushes the next-retry
//! time out exponentially, and the endpoint becomes eligible again once the
//! delay has passed.

use crate::endpoint::Endpoint;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

// Backoff is 2^fails minutes, capped at 2^6.
const MAX_BACKOFF_EXP: u32 = 6;

#[derive(Debug, Clone, Copy)]
pub struct FailureInfo {
    pub fails: u32,
    pub last_failure: Instant,
    pub next_retry: Instant,
}

#[derive(Default)]
struct RetryState {
    entries: Vec<Endpoint>,
    index: HashMap<String, usize>,
    failures: HashMap<String, FailureInfo>,
}

#[derive(Default)]
pub struct RetryPool {
    state: RwLock<RetryState>,
}

impl RetryPool {
    pub fn new() -> Self {
        RetryPool::default()
    }

    pub fn add(&self, endpoint: Endpoint) {
        let mut state = self.state.write();
        let key = endpoint.key();
        if state.index.contains_key(&key) {
            return;
        }
        let position = state.entries.len();
        state.entries.push(endpoint);
        state.index.insert(key, position);
    }

    pub fn remove(&self, endpoint: &Endpoint) {
        let mut state = self.state.write();
        let key = endpoint.key();
        let Some(position) = state.index.remove(&key) else {
            return;
        };
        state.entries.swap_remove(position);
        if position < state.entries.len() {
            let moved_key = state.entries[position].key();
            state.index.insert(moved_key, position);
        }
        state.failures.remove(&key);
    }

    /// Records a failed use. The endpoint stays in the pool but is excluded
    /// from [`eligible`](Self::eligible) until the backoff delay passes.
    pub fn mark_failed(&self, endpoint: &Endpoint) {
        let mut state = self.state.write();
        let key = endpoint.key();
        if !state.index.contains_key(&key) {
            return;
        }
        let now = Instant::now();
        let fails = state.failures.get(&key).map(|info| info.fails).unwrap_or(0) + 1;
        let delay = Duration::from_secs(60) * (1u32 << fails.min(MAX_BACKOFF_EXP));
        state.failures.insert(
            key.clone(),
            FailureInfo {
                fails,
                last_failure: now,
                next_retry: now + delay,
            },
        );
        tracing::debug!(endpoint = %key, fails, delay_secs = delay.as_secs(), "endpoint benched");
    }

    /// Records a successful use. The failure record is cleared only once its
    /// retry window has passed, so a success racing an active bench does not
    /// reset the backoff.
    pub fn mark_success(&self, endpoint: &Endpoint) {
        let mut state = self.state.write();
        let key = endpoint.key();
        if let Some(info) = state.failures.get(&key)
            && info.next_retry <= Instant::now()
        {
            state.failures.remove(&key);
        }
    }

    /// Endpoints currently allowed out: no failure record, or the record's
    /// next-retry time has passed.
    pub fn eligible(&self) -> Vec<Endpoint> {
        let state = self.state.read();
        let now = Instant::now();
        state
            .entries
            .iter()
            .filter(|endpoint| {
                state
                    .failures
                    .get(&endpoint.key())
                    .is_none_or(|info| info.next_retry <= now)
            })
            .cloned()
            .collect()
    }

    pub fn failure_info(&self, endpoint: &Endpoint) -> Option<FailureInfo> {
        self.state.read().failures.get(&endpoint.key()).copied()
    }

    pub fn count(&self) -> usize {
        self.state.read().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_endpoint_is_benched() {
        let pool = RetryPool::new();
        let ep = Endpoint::new("1.1.1.1", 80);
        pool.add(ep.clone());
        assert_eq!(pool.eligible().len(), 1);

        pool.mark_failed(&ep);
        assert!(pool.eligible().is_empty());
        let info = pool.failure_info(&ep).unwrap();
        assert_eq!(info.fails, 1);
        assert!(info.next_retry > Instant::now());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let pool = RetryPool::new();
        let ep = Endpoint::new("1.1.1.1", 80);
        pool.add(ep.clone());

        let mut last_delay = Duration::ZERO;
        for fails in 1..=10u32 {
            pool.mark_failed(&ep);
            let info = pool.failure_info(&ep).unwrap();
            let delay = info.next_retry - info.last_failure;
            let expected_exp = fails.min(MAX_BACKOFF_EXP);
            assert_eq!(delay, Duration::from_secs(60) * (1u32 << expected_exp));
            assert!(delay >= last_delay);
            last_delay = delay;
        }
        // Capped at 2^6 minutes.
        assert_eq!(last_delay, Duration::from_secs(64 * 60));
    }

    #[test]
    fn test_success_during_bench_keeps_backoff() {
        let pool = RetryPool::new();
        let ep = Endpoint::new("1.1.1.1", 80);
        pool.add(ep.clone());
        pool.mark_failed(&ep);

        // Retry window has not passed yet, so the record survives.
        pool.mark_success(&ep);
        assert!(pool.failure_info(&ep).is_some());
    }

    #[test]
    fn test_success_after_window_clears_record() {
        let pool = RetryPool::new();
        let ep = Endpoint::new("1.1.1.1", 80);
        pool.add(ep.clone());
        pool.mark_failed(&ep);

        // Rewind the record so its window has already passed.
        {
            let mut state = pool.state.write();
            let info = state.failures.get_mut(&ep.key()).unwrap();
            info.next_retry = Instant::now() - Duration::from_secs(1);
        }
        pool.mark_success(&ep);
        assert!(pool.failure_info(&ep).is_none());
        assert_eq!(pool.eligible().len(), 1);
    }

    #[test]
    fn test_remove_clears_failure_record() {
        let pool = RetryPool::new();
        let ep = Endpoint::new("1.1.1.1", 80);
        pool.add(ep.clone());
        pool.mark_failed(&ep);
        pool.remove(&ep);
        assert_eq!(pool.count(), 0);
        assert!(pool.failure_info(&ep).is_none());
    }
}
