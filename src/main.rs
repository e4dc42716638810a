//! App controller manager
//!
//! Main entry point. Sets up the Kubernetes client, starts the enabled controllers
//! and the metrics server, and shuts everything down on SIGINT/SIGTERM.

use kube::Client;
use tokio::signal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use app_controller::{config::Config, controllers, metrics};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting App controller manager");

    let config = Config::from_env()?;
    info!(?config, "Loaded configuration");

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    let mut metrics_handle = tokio::spawn(metrics::serve(config.metrics_port));
    info!("Metrics server starting on port {}", config.metrics_port);

    let shutdown = CancellationToken::new();
    let mut running = JoinSet::new();
    if config.app_controller_enabled {
        running.spawn(controllers::run_app_controller(
            client.clone(),
            config.clone(),
            shutdown.clone(),
        ));
    }
    if config.ingress_controller_enabled {
        running.spawn(controllers::run_ingress_controller(
            client.clone(),
            config.clone(),
            shutdown.clone(),
        ));
    }

    tokio::select! {
        Some(result) = running.join_next() => {
            error!(?result, "Controller exited unexpectedly");
        }
        result = &mut metrics_handle => {
            error!(?result, "Metrics server exited unexpectedly");
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, stopping controllers");
        }
    }

    // Let in-flight syncs finish before exiting
    shutdown.cancel();
    while let Some(result) = running.join_next().await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Controller stopped with error"),
            Err(e) => error!(error = %e, "Controller task failed"),
        }
    }
    metrics_handle.abort();

    info!("App controller manager stopped");
    Ok(())
}

/// Initialize tracing subscriber
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kube=warn,hyper=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received CTRL+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
