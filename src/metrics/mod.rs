//! Prometheus metrics for the App controllers
//!
//! This module exposes metrics for monitoring controller health, retries
//! and sync outcomes.

mod prometheus;

pub use prometheus::*;
