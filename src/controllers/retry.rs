//! Per-key retry bookkeeping for the controllers' error policies

use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, warn};

use super::backoff::ExponentialBackoff;
use crate::metrics;

/// How often a failing key is retried
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Retry with backoff until the key syncs
    Unbounded,
    /// Give up after this many consecutive failures
    Limited(u32),
}

/// Failure history of every key a controller has seen fail
#[derive(Debug)]
pub struct RetryTracker {
    controller: &'static str,
    policy: RetryPolicy,
    backoff: Mutex<ExponentialBackoff<String>>,
}

impl RetryTracker {
    pub fn new(controller: &'static str, policy: RetryPolicy) -> Self {
        Self::with_backoff(controller, policy, ExponentialBackoff::default())
    }

    pub fn with_backoff(
        controller: &'static str,
        policy: RetryPolicy,
        backoff: ExponentialBackoff<String>,
    ) -> Self {
        Self {
            controller,
            policy,
            backoff: Mutex::new(backoff),
        }
    }

    /// Record a failed sync of `key`. Returns the delay before the next attempt, or
    /// `None` once the key has used up its retries and has been forgotten.
    pub fn on_failure(&self, key: &str) -> Option<Duration> {
        let key = key.to_string();
        let mut backoff = self.backoff.lock().unwrap_or_else(|e| e.into_inner());

        if let RetryPolicy::Limited(max) = self.policy {
            if backoff.failures(&key) >= max {
                backoff.forget(&key);
                warn!(key = %key, retries = max, "Dropping key after exhausting its retries");
                metrics::DROPPED
                    .with_label_values(&[self.controller])
                    .inc();
                return None;
            }
        }

        let delay = backoff.when(&key);
        debug!(key = %key, ?delay, "Retrying key");
        metrics::RETRIES.with_label_values(&[self.controller]).inc();
        Some(delay)
    }

    /// A successful sync clears the key's failure history
    pub fn on_success(&self, key: &str) {
        self.backoff
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .forget(&key.to_string());
    }

    /// Consecutive failures recorded for `key`
    pub fn failures(&self, key: &str) -> u32 {
        self.backoff
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .failures(&key.to_string())
    }
}
