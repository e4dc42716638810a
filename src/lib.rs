//! App controllers
//!
//! Two reconciliation controllers sharing one engine: the App controller drives a
//! Deployment, Service and Ingress from each App resource, and the Service ingress
//! controller keeps an Ingress in place for Services annotated with `ingress/http`.

pub mod client;
pub mod config;
pub mod controllers;
pub mod crd;
pub mod error;
pub mod events;
pub mod informer;
pub mod key;
pub mod metrics;
pub mod reconcilers;

pub use error::{Error, Result};
