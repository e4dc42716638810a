//! App Custom Resource Definition

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// App resource specification
///
/// Each section names one child resource. An empty section (no name) means the
/// child is not managed for this App.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "appcontroller.k8s.io",
    version = "v1",
    kind = "App",
    plural = "apps",
    singular = "app",
    namespaced,
    status = "AppStatus",
    printcolumn = r#"{"name": "Deployment", "type": "string", "jsonPath": ".spec.deployment.name"}"#,
    printcolumn = r#"{"name": "Available", "type": "integer", "jsonPath": ".status.availableReplicas"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AppSpec {
    /// Workload deployment to run
    #[serde(default)]
    pub deployment: DeploymentSpec,

    /// Service exposing the workload
    #[serde(default)]
    pub service: ServiceSpec,

    /// Ingress routing external traffic to the service
    #[serde(default)]
    pub ingress: IngressSpec,
}

/// Deployment section of an App
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    /// Deployment name, also used as the container name
    #[serde(default)]
    pub name: String,

    /// Container image
    #[serde(default)]
    pub image: String,

    /// Desired replica count; left to the API server default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
}

/// Service section of an App
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    #[serde(default)]
    pub name: String,
}

/// Ingress section of an App
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressSpec {
    #[serde(default)]
    pub name: String,

    /// Host the single ingress rule matches
    #[serde(default)]
    pub hostname: String,
}

/// App status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppStatus {
    /// Available replicas reported by the owned Deployment
    #[serde(default)]
    pub available_replicas: i32,
}
