//! Custom Resource Definitions for the App controller

mod app;

pub use app::*;

use kube::CustomResourceExt;

/// Kind the primary controller expects in child owner references
pub const APP_KIND: &str = "App";

/// Generate all CRD YAML manifests
pub fn generate_crds() -> Result<Vec<String>, serde_yaml::Error> {
    Ok(vec![serde_yaml::to_string(&App::crd())?])
}
