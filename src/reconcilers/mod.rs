//! Reconcilers for the App and Service ingress controllers
//!
//! This module contains the business logic of a single sync pass:
//! - Building desired child objects from their parent
//! - Checking that an existing child belongs to the parent
//! - Creating or updating children through the mutating client

pub mod app;
pub mod desired;
pub mod ownership;
pub mod service_ingress;
