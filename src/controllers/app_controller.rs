//! App controller
//!
//! Watches Apps and the Deployments, Services and Ingresses they own, and syncs
//! each App on a bounded number of concurrent reconciles.

use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::{
    api::ListParams,
    runtime::{
        controller::{self, Action, Config as ControllerConfig, Controller},
        watcher::Config as WatcherConfig,
    },
    Api, Client, ResourceExt,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::bridge::app_for_child;
use super::retry::{RetryPolicy, RetryTracker};
use crate::client::KubeResourceClient;
use crate::config::Config;
use crate::crd::App;
use crate::error::{Error, Result};
use crate::events::{KubeEventPublisher, CONTROLLER_NAME};
use crate::informer::{watch, Touches};
use crate::key::key_for;
use crate::metrics;
use crate::reconcilers::app::{self as app_reconciler, AppContext};

/// Label used for this controller's metrics
const CONTROLLER: &str = "App";

struct Context {
    sync: AppContext,
    retries: RetryTracker,
}

/// Run the App controller until `shutdown` fires
pub async fn run(client: Client, config: Config, shutdown: CancellationToken) -> Result<()> {
    let api: Api<App> = Api::all(client.clone());

    // Verify CRD is installed
    if let Err(e) = api.list(&ListParams::default().limit(1)).await {
        error!("App CRD not installed: {}", e);
        return Err(e.into());
    }

    info!("Starting App controller");

    // App deletions need no work: children go with their owner references
    let (apps, app_triggers) = watch(api, WatcherConfig::default(), Touches::Applied);
    let (deployments, deployment_triggers) = watch::<Deployment>(
        Api::all(client.clone()),
        WatcherConfig::default(),
        Touches::All,
    );
    let (services, service_triggers) = watch::<Service>(
        Api::all(client.clone()),
        WatcherConfig::default(),
        Touches::All,
    );
    let (ingresses, ingress_triggers) = watch::<Ingress>(
        Api::all(client.clone()),
        WatcherConfig::default(),
        Touches::All,
    );

    let context = Arc::new(Context {
        sync: AppContext {
            apps: apps.clone(),
            deployments,
            services,
            ingresses,
            client: Arc::new(KubeResourceClient::new(client.clone(), CONTROLLER_NAME)),
            events: Arc::new(KubeEventPublisher::new(client, CONTROLLER_NAME)),
            update_status: config.update_status,
        },
        retries: RetryTracker::new(CONTROLLER, RetryPolicy::Unbounded),
    });

    let reconciles = Controller::for_stream(app_triggers, apps)
        .watches_stream(deployment_triggers, |d| app_for_child(&d))
        .watches_stream(service_triggers, |s| app_for_child(&s))
        .watches_stream(ingress_triggers, |i| app_for_child(&i))
        .with_config(ControllerConfig::default().concurrency(config.app_workers))
        .graceful_shutdown_on(shutdown.clone().cancelled_owned())
        .run(reconcile, error_policy, Arc::clone(&context))
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    debug!(
                        name = %obj.name,
                        namespace = obj.namespace.as_deref().unwrap_or_default(),
                        "Reconciled App"
                    );
                }
                Err(controller::Error::ObjectNotFound(obj)) => {
                    debug!(object = %obj, "Ignoring trigger for an App that is not cached");
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
                        info!("Caches synced, App controller ready");
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
    info!("App controller stopped");
    Ok(())
}

#[instrument(skip(ctx), fields(name = %app.name_any(), namespace = app.namespace()))]
async fn reconcile(app: Arc<App>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = metrics::RECONCILE_DURATION
        .with_label_values(&[CONTROLLER])
        .start_timer();
    metrics::RECONCILIATIONS.with_label_values(&[CONTROLLER]).inc();

    ctx.sync.wait_for_caches().await?;

    let key = key_for(app.as_ref());
    app_reconciler::sync(&ctx.sync, &key).await?;
    ctx.retries.on_success(&key);
    Ok(Action::await_change())
}

fn error_policy(app: Arc<App>, error: &Error, ctx: Arc<Context>) -> Action {
    metrics::RECONCILIATION_ERRORS
        .with_label_values(&[CONTROLLER, error.metric_label()])
        .inc();

    let key = key_for(app.as_ref());
    match ctx.retries.on_failure(&key) {
        Some(delay) => {
            error!(key = %key, error = %error, "Error syncing App, scheduling retry");
            Action::requeue(delay)
        }
        None => Action::await_change(),
    }
}
