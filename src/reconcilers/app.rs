//! App reconciler
//!
//! Converges one App key towards the Deployment, Service and Ingress its spec
//! names. Each pass re-reads everything from the caches, so running it again on an
//! unchanged App issues no writes.
//!
//! Children are synced in a fixed order and the pass stops at the first error; the
//! whole key is then retried, relying on the already-converged children being
//! no-ops the second time round.

use std::sync::Arc;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::events::EventType;
use kube::runtime::reflector::Store;
use kube::{Resource, ResourceExt};
use tracing::{debug, error, info, instrument};

use super::desired::{new_deployment, new_ingress, new_service};
use super::ownership::is_controlled_by;
use crate::client::ResourceClient;
use crate::crd::{App, AppStatus, APP_KIND};
use crate::error::{Error, Result};
use crate::events::{actions, messages, reasons, EventPublisher};
use crate::informer::{get_cached, wait_for_sync};
use crate::key::split_key;
use crate::metrics;

/// Everything a sync pass reads from or writes to
pub struct AppContext {
    pub apps: Store<App>,
    pub deployments: Store<Deployment>,
    pub services: Store<Service>,
    pub ingresses: Store<Ingress>,
    pub client: Arc<dyn ResourceClient>,
    pub events: Arc<dyn EventPublisher>,
    /// Write `status.availableReplicas` after a successful pass
    pub update_status: bool,
}

impl AppContext {
    /// Wait until every cache the sync reads has its initial listing
    pub async fn wait_for_caches(&self) -> Result<()> {
        wait_for_sync(&self.apps).await?;
        wait_for_sync(&self.deployments).await?;
        wait_for_sync(&self.services).await?;
        wait_for_sync(&self.ingresses).await
    }
}

/// Sync the App identified by `key`
#[instrument(skip(ctx))]
pub async fn sync(ctx: &AppContext, key: &str) -> Result<()> {
    let (namespace, name) = match split_key(key) {
        Ok(parts) => parts,
        Err(e) => {
            error!(error = %e, "Dropping malformed key");
            return Ok(());
        }
    };

    let Some(app) = get_cached(&ctx.apps, &namespace, &name) else {
        info!("App no longer exists");
        return Ok(());
    };

    let deployment = sync_deployment(ctx, key, &app).await?;
    sync_service(ctx, key, &app).await?;
    sync_ingress(ctx, key, &app).await?;

    if ctx.update_status {
        if let Some(deployment) = &deployment {
            update_app_status(ctx, &app, deployment).await?;
        }
    }

    ctx.events
        .publish(
            &app.object_ref(&()),
            EventType::Normal,
            reasons::SUCCESS_SYNCED,
            actions::RECONCILE,
            Some(messages::RESOURCE_SYNCED.to_string()),
        )
        .await;
    Ok(())
}

/// Returns the Deployment as last seen, or `None` when the App has no deployment
/// section.
async fn sync_deployment(ctx: &AppContext, key: &str, app: &App) -> Result<Option<Deployment>> {
    let spec = &app.spec.deployment;
    if spec.name.is_empty() {
        // Not retried: the next App update re-triggers the sync.
        error!(key, "deployment name must be specified");
        return Ok(None);
    }

    let Some(existing) = get_cached(&ctx.deployments, &namespace_of(app), &spec.name) else {
        let created = ctx.client.create_deployment(&new_deployment(app)).await;
        return created_child(created, "Deployment", &spec.name).map(Some);
    };

    ensure_owned(ctx, app, existing.as_ref(), "Deployment").await?;

    let current = existing.spec.as_ref().and_then(|s| s.replicas);
    match spec.replicas {
        Some(desired) if current != Some(desired) => {
            debug!(
                app = %app.name_any(),
                desired,
                current = ?current,
                "Replica count drifted, updating deployment"
            );
            let updated = ctx.client.update_deployment(&new_deployment(app)).await?;
            metrics::CHILD_OPERATIONS
                .with_label_values(&["Deployment", "update"])
                .inc();
            Ok(Some(updated))
        }
        _ => Ok(Some(Deployment::clone(&existing))),
    }
}

async fn sync_service(ctx: &AppContext, key: &str, app: &App) -> Result<()> {
    let name = &app.spec.service.name;
    if name.is_empty() {
        error!(key, "service name must be specified");
        return Ok(());
    }

    match get_cached(&ctx.services, &namespace_of(app), name) {
        Some(existing) => ensure_owned(ctx, app, existing.as_ref(), "Service").await,
        None => {
            let created = ctx.client.create_service(&new_service(app)).await;
            created_child(created, "Service", name).map(|_| ())
        }
    }
}

async fn sync_ingress(ctx: &AppContext, key: &str, app: &App) -> Result<()> {
    let spec = &app.spec.ingress;
    if spec.name.is_empty() {
        error!(key, "ingress name must be specified");
        return Ok(());
    }
    if spec.hostname.is_empty() {
        error!(key, "ingress hostname must be specified");
        return Ok(());
    }

    match get_cached(&ctx.ingresses, &namespace_of(app), &spec.name) {
        Some(existing) => ensure_owned(ctx, app, existing.as_ref(), "Ingress").await,
        None => {
            let created = ctx.client.create_ingress(&new_ingress(app)).await;
            created_child(created, "Ingress", &spec.name).map(|_| ())
        }
    }
}

/// A create that lost a race to another writer fails the pass. The retry finds the
/// object in the cache and checks its owner before anything else happens.
fn created_child<K>(result: Result<K>, kind: &str, name: &str) -> Result<K> {
    match result {
        Ok(obj) => {
            info!(kind, name, "Created child resource");
            metrics::CHILD_OPERATIONS
                .with_label_values(&[kind, "create"])
                .inc();
            Ok(obj)
        }
        Err(e) => {
            if e.is_already_exists() {
                debug!(kind, name, "Child already exists, cache not caught up yet");
            }
            Err(e)
        }
    }
}

/// Refuse to touch a child the App does not control, recording a warning on the App
async fn ensure_owned<K: ResourceExt>(
    ctx: &AppContext,
    app: &App,
    child: &K,
    kind: &str,
) -> Result<()> {
    if is_controlled_by(child, app) {
        return Ok(());
    }

    let err = Error::ResourceExists {
        name: child.name_any(),
        owner_kind: APP_KIND.to_string(),
    };
    metrics::OWNERSHIP_CONFLICTS.with_label_values(&[kind]).inc();
    ctx.events
        .publish(
            &app.object_ref(&()),
            EventType::Warning,
            reasons::ERR_RESOURCE_EXISTS,
            actions::RECONCILE,
            Some(err.to_string()),
        )
        .await;
    Err(err)
}

/// Copy the Deployment's available replicas into the App status
async fn update_app_status(ctx: &AppContext, app: &App, deployment: &Deployment) -> Result<()> {
    let available = deployment
        .status
        .as_ref()
        .and_then(|s| s.available_replicas)
        .unwrap_or(0);
    if app.status.as_ref().map(|s| s.available_replicas) == Some(available) {
        return Ok(());
    }

    let mut updated = app.clone();
    updated.status = Some(AppStatus {
        available_replicas: available,
    });
    ctx.client.update_app_status(&updated).await?;
    debug!(app = %app.name_any(), available, "Updated App status");
    Ok(())
}

fn namespace_of(app: &App) -> String {
    app.namespace().unwrap_or_default()
}
