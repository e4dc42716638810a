//! Per-item exponential failure backoff

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

/// Base delay applied after the first failure
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(5);

/// Upper bound on any single delay
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(1000);

/// Tracks failures per item and hands out `base * 2^failures` delays, capped at `max`.
#[derive(Debug)]
pub struct ExponentialBackoff<T> {
    failures: HashMap<T, u32>,
    base: Duration,
    max: Duration,
}

impl<T: Eq + Hash + Clone> ExponentialBackoff<T> {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            failures: HashMap::new(),
            base,
            max,
        }
    }

    /// Record a failure for `item` and return how long to wait before retrying it
    pub fn when(&mut self, item: &T) -> Duration {
        let exp = self.failures.entry(item.clone()).or_insert(0);
        let factor = 2u32.checked_pow(*exp).unwrap_or(u32::MAX);
        *exp = exp.saturating_add(1);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Number of failures recorded since the last `forget`
    pub fn failures(&self, item: &T) -> u32 {
        self.failures.get(item).copied().unwrap_or(0)
    }

    /// Drop the failure history of `item`
    pub fn forget(&mut self, item: &T) {
        self.failures.remove(item);
    }
}

impl<T: Eq + Hash + Clone> Default for ExponentialBackoff<T> {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }
}
