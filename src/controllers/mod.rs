//! Kubernetes controllers
//!
//! This module wires watches, trigger mappers and retry policies around the
//! reconcilers.

mod app_controller;
pub mod backoff;
pub mod bridge;
mod ingress_controller;
pub mod retry;

pub use app_controller::run as run_app_controller;
pub use ingress_controller::run as run_ingress_controller;
