//! Service ingress controller
//!
//! Watches Services for the `ingress/http` annotation and Ingresses for deletions,
//! giving up on a Service after a bounded number of retries.

use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::{
    runtime::{
        controller::{self, Action, Config as ControllerConfig, Controller},
        watcher::Config as WatcherConfig,
    },
    Api, Client, ResourceExt,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::bridge::service_for_ingress;
use super::retry::{RetryPolicy, RetryTracker};
use crate::client::KubeResourceClient;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::CONTROLLER_NAME;
use crate::informer::{watch, Touches};
use crate::key::key_for;
use crate::metrics;
use crate::reconcilers::service_ingress::{self, ServiceIngressContext};

const CONTROLLER: &str = "Service";

struct Context {
    sync: ServiceIngressContext,
    retries: RetryTracker,
}

/// Run the Service ingress controller until `shutdown` fires
pub async fn run(client: Client, config: Config, shutdown: CancellationToken) -> Result<()> {
    info!("Starting Service ingress controller");

    let (services, service_triggers) = watch::<Service>(
        Api::all(client.clone()),
        WatcherConfig::default(),
        Touches::Applied,
    );
    // Only a deleted Ingress needs its Service resynced
    let (ingresses, ingress_triggers) = watch::<Ingress>(
        Api::all(client.clone()),
        WatcherConfig::default(),
        Touches::Deleted,
    );

    let context = Arc::new(Context {
        sync: ServiceIngressContext {
            services: services.clone(),
            ingresses,
            client: Arc::new(KubeResourceClient::new(client, CONTROLLER_NAME)),
        },
        retries: RetryTracker::new(
            CONTROLLER,
            RetryPolicy::Limited(config.ingress_max_retries),
        ),
    });

    let reconciles = Controller::for_stream(service_triggers, services)
        .watches_stream(ingress_triggers, |i| service_for_ingress(&i))
        .with_config(ControllerConfig::default().concurrency(config.ingress_workers))
        .graceful_shutdown_on(shutdown.clone().cancelled_owned())
        .run(reconcile, error_policy, Arc::clone(&context))
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => debug!(name = %obj.name, "Reconciled Service"),
                Err(controller::Error::ObjectNotFound(obj)) => {
                    debug!(object = %obj, "Ignoring trigger for a Service that is not cached");
                }
                Err(e) => warn!(error = %e, "Reconciliation error"),
            }
        });

    let ready = {
        let context = Arc::clone(&context);
        let shutdown = shutdown.clone();
        async move {
            tokio::select! {
                _ = shutdown.cancelled() => false,
                synced = context.sync.wait_for_caches() => match synced {
                    Ok(()) => {
                        metrics::READY_CONTROLLERS.inc();
                        true
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to wait for caches to sync");
                        false
                    }
                },
            }
        }
    };

    let (ready, ()) = tokio::join!(ready, reconciles);
    if ready {
        metrics::READY_CONTROLLERS.dec();
    }
    info!("Service ingress controller stopped");
    Ok(())
}

#[instrument(skip(ctx), fields(name = %service.name_any(), namespace = service.namespace()))]
async fn reconcile(service: Arc<Service>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = metrics::RECONCILE_DURATION
        .with_label_values(&[CONTROLLER])
        .start_timer();
    metrics::RECONCILIATIONS.with_label_values(&[CONTROLLER]).inc();

    ctx.sync.wait_for_caches().await?;

    let key = key_for(service.as_ref());
    service_ingress::sync(&ctx.sync, &key).await?;
    ctx.retries.on_success(&key);
    Ok(Action::await_change())
}

fn error_policy(service: Arc<Service>, error: &Error, ctx: Arc<Context>) -> Action {
    metrics::RECONCILIATION_ERRORS
        .with_label_values(&[CONTROLLER, error.metric_label()])
        .inc();

    let key = key_for(service.as_ref());
    match ctx.retries.on_failure(&key) {
        Some(delay) => {
            error!(key = %key, error = %error, "Error syncing Service, scheduling retry");
            Action::requeue(delay)
        }
        None => Action::await_change(),
    }
}
