//! Service ingress reconciler
//!
//! Keeps a same-named Ingress in place for every Service carrying the
//! `ingress/http` annotation.

use std::sync::Arc;

use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::reflector::Store;
use kube::ResourceExt;
use tracing::{debug, error, info, instrument};

use super::desired::default_ingress;
use crate::client::ResourceClient;
use crate::error::Result;
use crate::informer::{get_cached, wait_for_sync};
use crate::key::split_key;
use crate::metrics;

/// Annotation requesting an ingress for a Service
pub const INGRESS_ANNOTATION: &str = "ingress/http";

/// Caches and client used by the Service ingress sync
pub struct ServiceIngressContext {
    pub services: Store<Service>,
    pub ingresses: Store<Ingress>,
    pub client: Arc<dyn ResourceClient>,
}

impl ServiceIngressContext {
    /// Wait until both caches have their initial listing
    pub async fn wait_for_caches(&self) -> Result<()> {
        wait_for_sync(&self.services).await?;
        wait_for_sync(&self.ingresses).await
    }
}

/// What a sync pass should do for one Service
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngressAction {
    Create,
    /// The annotation is gone but the ingress remains. Deletion is not performed.
    Delete,
    Nothing,
}

impl IngressAction {
    pub fn plan(annotated: bool, ingress_present: bool) -> Self {
        match (annotated, ingress_present) {
            (true, false) => IngressAction::Create,
            (false, true) => IngressAction::Delete,
            _ => IngressAction::Nothing,
        }
    }
}

/// Sync the Service identified by `key`
#[instrument(skip(ctx))]
pub async fn sync(ctx: &ServiceIngressContext, key: &str) -> Result<()> {
    let (namespace, name) = match split_key(key) {
        Ok(parts) => parts,
        Err(e) => {
            error!(error = %e, "Dropping malformed key");
            return Ok(());
        }
    };

    let Some(service) = get_cached(&ctx.services, &namespace, &name) else {
        debug!("Service no longer exists");
        return Ok(());
    };

    let annotated = service.annotations().contains_key(INGRESS_ANNOTATION);
    let ingress = get_cached(&ctx.ingresses, &namespace, &name);

    match IngressAction::plan(annotated, ingress.is_some()) {
        IngressAction::Create => {
            info!(service = %name, "Creating ingress");
            if let Err(e) = ctx.client.create_ingress(&default_ingress(&service)).await {
                if e.is_already_exists() {
                    debug!(service = %name, "Ingress already exists, cache not caught up yet");
                }
                return Err(e);
            }
            metrics::CHILD_OPERATIONS
                .with_label_values(&["Ingress", "create"])
                .inc();
        }
        IngressAction::Delete => {
            // TODO: issue the ingress delete once removal should tear down routing.
            info!(service = %name, "Annotation removed, ingress left in place");
        }
        IngressAction::Nothing => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_covers_all_states() {
        assert_eq!(IngressAction::plan(true, false), IngressAction::Create);
        assert_eq!(IngressAction::plan(false, true), IngressAction::Delete);
        assert_eq!(IngressAction::plan(true, true), IngressAction::Nothing);
        assert_eq!(IngressAction::plan(false, false), IngressAction::Nothing);
    }
}
