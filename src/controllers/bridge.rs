//! Child-to-parent trigger mappers
//!
//! Changes to a child object are routed to the reconcile of its controlling parent,
//! so a single sync path handles both. Children whose parent is not cached are
//! dropped by the controller when it looks the parent up.

use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::reflector::ObjectRef;
use kube::{Resource, ResourceExt};
use tracing::trace;

use crate::crd::{App, APP_KIND};
use crate::reconcilers::ownership::OwnerLink;

/// The App controlling a Deployment, Service or Ingress
pub fn app_for_child<K: ResourceExt>(child: &K) -> Option<ObjectRef<App>> {
    let owner = OwnerLink::controller_of(child)?;
    if owner.kind != APP_KIND {
        return None;
    }
    trace!(object = %child.name_any(), owner = %owner.name, "Processing child object");
    Some(ObjectRef::new(&owner.name).within(&child.namespace().unwrap_or_default()))
}

/// The Service controlling an Ingress
pub fn service_for_ingress(ingress: &Ingress) -> Option<ObjectRef<Service>> {
    let owner = OwnerLink::controller_of(ingress)?;
    if owner.kind != Service::kind(&()) {
        return None;
    }
    Some(ObjectRef::new(&owner.name).within(&ingress.namespace().unwrap_or_default()))
}
