//! Kubernetes Event recording
//!
//! Notices are fire-and-forget: a failed publish is logged and never changes the
//! outcome of a sync.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Component name reported on every Event
pub const CONTROLLER_NAME: &str = "appcontroller";

/// Event reasons
pub mod reasons {
    /// An App converged successfully
    pub const SUCCESS_SYNCED: &str = "Synced";
    /// A child with the desired name exists and is not owned by the App
    pub const ERR_RESOURCE_EXISTS: &str = "ErrResourceExists";
}

/// Event messages
pub mod messages {
    pub const RESOURCE_SYNCED: &str = "App synced successfully";
}

/// Event actions
pub mod actions {
    pub const RECONCILE: &str = "Reconcile";
}

/// Sink for human-readable notices attached to a resource
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Publishes notices as Kubernetes Events
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(
                reason,
                object = resource_ref.name.as_deref().unwrap_or_default(),
                error = %e,
                "Failed to publish event"
            );
        }
    }
}
