//! Queue-utilization driven worker scaling decisions.
//!
//! The decision itself is a pure function; the loop that applies it lives in
//! [`crate::pool`].

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScalerConfig {
    #[serde(default = "default_min_workers")]
    pub min_workers: usize,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Queue utilization above which workers are added.
    #[serde(default = "default_scale_up_threshold")]
    pub scale_up_threshold: f64,
    /// Queue utilization below which idle workers are removed.
    #[serde(default = "default_scale_down_threshold")]
    pub scale_down_threshold: f64,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_min_workers() -> usize {
    2
}
fn default_max_workers() -> usize {
    10
}
fn default_scale_up_threshold() -> f64 {
    0.8
}
fn default_scale_down_threshold() -> f64 {
    0.2
}
fn default_interval_secs() -> u64 {
    5
}

impl Default for ScalerConfig {
    fn default() -> Self {
        ScalerConfig {
            min_workers: default_min_workers(),
            max_workers: default_max_workers(),
            scale_up_threshold: default_scale_up_threshold(),
            scale_down_threshold: default_scale_down_threshold(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl ScalerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleAction {
    Grow(usize),
    Shrink(usize),
    Hold,
}

/// Half the remaining headroom up (or slack down), always at least one
/// worker per tick.
pub fn plan(config: &ScalerConfig, utilization: f64, workers: usize) -> ScaleAction {
    if utilization > config.scale_up_threshold && workers < config.max_workers {
        return ScaleAction::Grow((config.max_workers - workers).div_ceil(2));
    }
    if utilization < config.scale_down_threshold && workers > config.min_workers {
        return ScaleAction::Shrink((workers - config.min_workers).div_ceil(2));
    }
    ScaleAction::Hold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ScalerConfig {
        ScalerConfig {
            min_workers: 2,
            max_workers: 10,
            scale_up_threshold: 0.8,
            scale_down_threshold: 0.2,
            interval_secs: 5,
        }
    }

    #[test]
    fn test_grows_half_the_headroom() {
        assert_eq!(plan(&config(), 0.9, 2), ScaleAction::Grow(4));
        assert_eq!(plan(&config(), 0.9, 9), ScaleAction::Grow(1));
    }

    #[test]
    fn test_holds_at_max() {
        assert_eq!(plan(&config(), 1.0, 10), ScaleAction::Hold);
    }

    #[test]
    fn test_shrinks_half_the_slack() {
        assert_eq!(plan(&config(), 0.0, 10), ScaleAction::Shrink(4));
        assert_eq!(plan(&config(), 0.1, 3), ScaleAction::Shrink(1));
    }

    #[test]
    fn test_holds_at_min() {
        assert_eq!(plan(&config(), 0.0, 2), ScaleAction::Hold);
    }

    #[test]
    fn test_holds_in_band() {
        assert_eq!(plan(&config(), 0.5, 5), ScaleAction::Hold);
    }
}
