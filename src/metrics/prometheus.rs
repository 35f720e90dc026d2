//! Prometheus metrics definitions and HTTP server

use std::net::SocketAddr;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::reconcilers::PassReport;

lazy_static::lazy_static! {
    /// Total number of reconcile passes
    pub static ref RECONCILIATIONS: CounterVec = register_counter_vec!(
        "pretzelai_operator_reconciliations_total",
        "Total number of reconcile passes",
        &["outcome"]
    ).unwrap();

    /// Total number of failed reconcile passes
    pub static ref RECONCILIATION_ERRORS: CounterVec = register_counter_vec!(
        "pretzelai_operator_reconciliation_errors_total",
        "Total number of failed reconcile passes",
        &["reason"]
    ).unwrap();

    /// Reconcile pass duration histogram
    pub static ref RECONCILE_DURATION: HistogramVec = register_histogram_vec!(
        "pretzelai_operator_reconcile_duration_seconds",
        "Duration of reconcile passes in seconds",
        &["outcome"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    /// Writes to owned resources
    pub static ref OWNED_RESOURCE_WRITES: CounterVec = register_counter_vec!(
        "pretzelai_operator_owned_resource_writes_total",
        "Number of creates and updates of owned resources",
        &["kind", "action"]
    ).unwrap();

    /// Ready replicas per PretzelAI
    pub static ref READY_REPLICAS: GaugeVec = register_gauge_vec!(
        "pretzelai_operator_ready_replicas",
        "Number of ready replicas per PretzelAI",
        &["namespace", "name"]
    ).unwrap();
}

/// Record the owned-resource writes and replica count of a converged pass
pub fn record_pass(namespace: &str, name: &str, report: &PassReport) {
    let steps = [
        ("Deployment", Some(report.workload)),
        ("Service", Some(report.exposure)),
        ("ConfigMap", report.config_map),
    ];
    for (kind, action) in steps {
        if let Some(action) = action.filter(|a| a.wrote()) {
            OWNED_RESOURCE_WRITES
                .with_label_values(&[kind, action.as_str()])
                .inc();
        }
    }

    READY_REPLICAS
        .with_label_values(&[namespace, name])
        .set(f64::from(report.ready_replicas));
}

/// Drop the per-instance series of a PretzelAI that no longer exists
pub fn forget_instance(namespace: &str, name: &str) {
    // Absent when the instance never converged
    let _ = READY_REPLICAS.remove_label_values(&[namespace, name]);
}

/// Serve metrics and health endpoints until `shutdown` fires
pub async fn serve(port: u16, shutdown: CancellationToken) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    loop {
        let (stream, _) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = shutdown.cancelled() => {
                info!("Metrics server stopping");
                return Ok(());
            }
        };
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
        "/healthz" | "/readyz" => text_response(StatusCode::OK, "ok"),
        _ => text_response(StatusCode::NOT_FOUND, "Not Found"),
    };

    Ok(response)
}

fn metrics_response() -> Response<Full<Bytes>> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return text_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics");
    }

    let mut response = Response::new(Full::new(Bytes::from(buffer)));
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}
