//! Prometheus metrics definitions and HTTP server

use std::net::SocketAddr;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_gauge, CounterVec, Encoder,
    HistogramVec, IntGauge, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info};

lazy_static::lazy_static! {
    /// Total number of sync passes
    pub static ref RECONCILIATIONS: CounterVec = register_counter_vec!(
        "app_controller_reconciliations_total",
        "Total number of sync passes",
        &["controller"]
    ).unwrap();

    /// Total number of failed sync passes
    pub static ref RECONCILIATION_ERRORS: CounterVec = register_counter_vec!(
        "app_controller_reconciliation_errors_total",
        "Total number of failed sync passes by error kind",
        &["controller", "reason"]
    ).unwrap();

    /// Sync duration histogram
    pub static ref RECONCILE_DURATION: HistogramVec = register_histogram_vec!(
        "app_controller_reconcile_duration_seconds",
        "Duration of sync passes in seconds",
        &["controller"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    /// Failed syncs scheduled for another attempt
    pub static ref RETRIES: CounterVec = register_counter_vec!(
        "app_controller_retries_total",
        "Total number of failed syncs requeued with backoff",
        &["controller"]
    ).unwrap();

    /// Keys given up on after exhausting their retries
    pub static ref DROPPED: CounterVec = register_counter_vec!(
        "app_controller_dropped_total",
        "Total number of keys dropped after exhausting retries",
        &["controller"]
    ).unwrap();

    /// Children found under the expected name but not owned by the expected parent
    pub static ref OWNERSHIP_CONFLICTS: CounterVec = register_counter_vec!(
        "app_controller_ownership_conflicts_total",
        "Total number of child resources not managed by their expected owner",
        &["kind"]
    ).unwrap();

    /// Mutating calls issued against child resources
    pub static ref CHILD_OPERATIONS: CounterVec = register_counter_vec!(
        "app_controller_child_operations_total",
        "Total number of create/update calls issued for child resources",
        &["kind", "operation"]
    ).unwrap();

    /// Controllers whose caches have synced
    pub static ref READY_CONTROLLERS: IntGauge = register_int_gauge!(
        "app_controller_ready_controllers",
        "Number of controllers with synced caches"
    ).unwrap();

    /// Process health (1 = healthy, 0 = unhealthy)
    pub static ref CONTROLLER_HEALTH: prometheus::Gauge = prometheus::register_gauge!(
        "app_controller_health",
        "Controller process health status (1 = healthy, 0 = unhealthy)"
    ).unwrap();
}

/// Start the metrics HTTP server
pub async fn serve(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    CONTROLLER_HEALTH.set(1.0);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(handle_request))
                .await
            {
                error!("Error serving connection: {}", e);
            }
        });
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let response = match req.uri().path() {
        "/metrics" => metrics_response(),
        "/healthz" | "/health" => text_response(StatusCode::OK, "ok"),
        "/readyz" | "/ready" => ready_response(),
        _ => text_response(StatusCode::NOT_FOUND, "Not Found"),
    };

    Ok(response)
}

fn metrics_response() -> Response<Full<Bytes>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return text_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics");
    }

    let mut response = Response::new(Full::new(Bytes::from(buffer)));
    if let Ok(content_type) = hyper::header::HeaderValue::from_str(encoder.format_type()) {
        response
            .headers_mut()
            .insert(hyper::header::CONTENT_TYPE, content_type);
    }
    response
}

/// Ready once at least one controller has synced its caches
fn ready_response() -> Response<Full<Bytes>> {
    if READY_CONTROLLERS.get() > 0 {
        text_response(StatusCode::OK, "ok")
    } else {
        text_response(StatusCode::SERVICE_UNAVAILABLE, "caches not synced")
    }
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
}
