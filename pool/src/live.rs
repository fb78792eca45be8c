//! The set of endpoints that passed their most recent liveness probe.

use crate::endpoint::Endpoint;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::time::SystemTime;

/// An endpoint together with the measurements of its last probe.
#[derive(Debug, Clone, Serialize)]
pub struct LiveEndpoint {
    pub endpoint: Endpoint,
    /// Probe round trip in milliseconds. 0 means never measured.
    pub latency_ms: u64,
    /// ISO country label reported by the probe target, "" when unknown.
    pub country: String,
    pub checked_at: SystemTime,
}

impl LiveEndpoint {
    pub fn new(endpoint: Endpoint, latency_ms: u64, country: impl Into<String>) -> Self {
        LiveEndpoint {
            endpoint,
            latency_ms,
            country: country.into(),
            checked_at: SystemTime::now(),
        }
    }

    pub fn key(&self) -> String {
        self.endpoint.key()
    }
}

/// Narrow read capability handed to selection strategies.
pub trait PoolView: Send + Sync {
    fn snapshot(&self) -> Vec<LiveEndpoint>;
    fn count(&self) -> usize;
}

#[derive(Default)]
struct PoolState {
    entries: Vec<LiveEndpoint>,
    // key -> position in `entries`; kept exactly in sync with it.
    index: HashMap<String, usize>,
    cursor: usize,
    added_total: u64,
    removed_total: u64,
}

/// In-memory set of currently trusted endpoints.
///
/// The round-robin cursor indexes the same vector that `remove` may shrink,
/// so `get_next` mutates under the exclusive lock rather than as a detached
/// atomic increment. Readers (`snapshot`, `count`, the status view) take the
/// shared lock.
#[derive(Default)]
pub struct LivePool {
    state: RwLock<PoolState>,
}

impl LivePool {
    pub fn new() -> Self {
        LivePool::default()
    }

    /// Inserts a probed endpoint. Duplicate keys are a silent no-op.
    pub fn add(&self, live: LiveEndpoint) {
        let mut state = self.state.write();
        let key = live.key();
        if state.index.contains_key(&key) {
            return;
        }
        let position = state.entries.len();
        state.entries.push(live);
        state.index.insert(key, position);
        state.added_total += 1;
        metrics::counter!("pool.added").increment(1);
        metrics::gauge!("pool.live").set(state.entries.len() as f64);
    }

    /// Inserts an endpoint that skipped probing, with zero latency and no
    /// country label.
    pub fn add_unchecked(&self, endpoint: Endpoint) {
        self.add(LiveEndpoint::new(endpoint, 0, ""));
    }

    /// Drops an endpoint from the pool. Unknown keys are a silent no-op.
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
        state.removed_total += 1;
        metrics::counter!("pool.removed").increment(1);
        metrics::gauge!("pool.live").set(state.entries.len() as f64);
        tracing::debug!(endpoint = %key, "removed endpoint from live pool");
    }

    /// Round-robin pick: the entry at cursor mod len, advancing the cursor.
    pub fn get_next(&self) -> Option<Endpoint> {
        let mut state = self.state.write();
        if state.entries.is_empty() {
            return None;
        }
        let position = state.cursor % state.entries.len();
        state.cursor = state.cursor.wrapping_add(1);
        Some(state.entries[position].endpoint.clone())
    }

    pub fn count(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn snapshot(&self) -> Vec<LiveEndpoint> {
        self.state.read().entries.clone()
    }

    /// Lifetime `(added, removed)` counters.
    pub fn added_removed(&self) -> (u64, u64) {
        let state = self.state.read();
        (state.added_total, state.removed_total)
    }

    /// One URL per live endpoint, newline-terminated.
    pub fn export_text(&self) -> String {
        let state = self.state.read();
        let mut out = String::new();
        for live in &state.entries {
            out.push_str(&live.endpoint.to_url());
            out.push('\n');
        }
        out
    }

    /// Drops every entry and resets the round-robin cursor. Lifetime
    /// counters are preserved.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.index.clear();
        state.cursor = 0;
        metrics::gauge!("pool.live").set(0.0);
    }
}

impl PoolView for LivePool {
    fn snapshot(&self) -> Vec<LiveEndpoint> {
        LivePool::snapshot(self)
    }

    fn count(&self) -> usize {
        LivePool::count(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn live(host: &str, port: u16) -> LiveEndpoint {
        LiveEndpoint::new(Endpoint::new(host, port), 100, "US")
    }

    fn assert_index_consistent(pool: &LivePool) {
        let state = pool.state.read();
        assert_eq!(state.index.len(), state.entries.len());
        for (key, &position) in &state.index {
            assert_eq!(&state.entries[position].key(), key);
        }
    }

    #[test]
    fn test_add_and_duplicate_suppression() {
        let pool = LivePool::new();
        pool.add(live("1.1.1.1", 80));
        pool.add(live("1.1.1.1", 80));
        assert_eq!(pool.count(), 1);
        assert_eq!(pool.added_removed(), (1, 0));
        assert_index_consistent(&pool);
    }

    #[test]
    fn test_remove_swaps_with_last() {
        let pool = LivePool::new();
        pool.add(live("a", 1));
        pool.add(live("b", 2));
        pool.add(live("c", 3));
        pool.remove(&Endpoint::new("a", 1));
        assert_eq!(pool.count(), 2);
        assert_index_consistent(&pool);
        // Removing an unknown key is a no-op and moves no counters.
        pool.remove(&Endpoint::new("nope", 9));
        assert_eq!(pool.added_removed(), (3, 1));
        assert_index_consistent(&pool);
    }

    #[test]
    fn test_index_consistency_over_random_ops() {
        let pool = LivePool::new();
        for i in 0..50u16 {
            pool.add(live("host", 1000 + i));
        }
        for i in (0..50u16).step_by(3) {
            pool.remove(&Endpoint::new("host", 1000 + i));
            assert_index_consistent(&pool);
        }
    }

    #[test]
    fn test_round_robin_fairness() {
        let pool = LivePool::new();
        pool.add(live("a", 1));
        pool.add(live("b", 2));
        pool.add(live("c", 3));

        let mut seen: HashMap<String, usize> = HashMap::new();
        for _ in 0..6 {
            let ep = pool.get_next().unwrap();
            *seen.entry(ep.key()).or_default() += 1;
        }
        assert_eq!(seen.len(), 3);
        assert!(seen.values().all(|&n| n == 2), "uneven rotation: {seen:?}");
    }

    #[test]
    fn test_get_next_on_empty_pool() {
        let pool = LivePool::new();
        assert_eq!(pool.get_next(), None);
    }

    #[test]
    fn test_get_next_survives_shrink() {
        let pool = LivePool::new();
        pool.add(live("a", 1));
        pool.add(live("b", 2));
        // Push the cursor past the shrunk length.
        pool.get_next();
        pool.get_next();
        pool.get_next();
        pool.remove(&Endpoint::new("b", 2));
        assert!(pool.get_next().is_some());
    }

    #[test]
    fn test_export_text() {
        let pool = LivePool::new();
        pool.add(live("1.1.1.1", 80));
        assert_eq!(pool.export_text(), "http://1.1.1.1:80\n");
    }

    #[test]
    fn test_clear_resets_cursor_but_not_counters() {
        let pool = LivePool::new();
        pool.add(live("a", 1));
        pool.get_next();
        pool.clear();
        assert_eq!(pool.count(), 0);
        assert_eq!(pool.get_next(), None);
        assert_eq!(pool.added_removed(), (1, 0));
    }
}
