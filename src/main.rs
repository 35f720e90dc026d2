//! PretzelAI Kubernetes Operator
//!
//! Main entry point for the operator. Parses configuration, sets up the
//! Kubernetes client, and runs the reconciliation loop and metrics server
//! until a shutdown signal arrives.

use clap::Parser;
use kube::Client;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pretzelai_operator::{
    config::LogFormat,
    controllers::{pretzel_ai_controller, Context},
    metrics,
    store::KubeStore,
    OperatorConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = OperatorConfig::parse();

    init_tracing(config.log_format);

    info!("Starting PretzelAI Operator");

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    let shutdown = CancellationToken::new();
    let store = KubeStore::new(client.clone(), config.field_manager.clone());
    let metrics_port = config.metrics_port;
    let context = Context::new(store, config, shutdown.clone());

    let mut metrics_handle = tokio::spawn(metrics::serve(metrics_port, shutdown.clone()));
    info!("Metrics server starting on port {}", metrics_port);

    let mut controller_handle = tokio::spawn(pretzel_ai_controller::run(client, context));

    let controller_running = tokio::select! {
        _ = &mut controller_handle => {
            error!("PretzelAI controller exited unexpectedly");
            false
        }
        res = &mut metrics_handle => {
            error!("Metrics server exited unexpectedly: {:?}", res);
            true
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, stopping operator");
            true
        }
    };

    shutdown.cancel();

    // Let passes already in flight finish before the runtime goes away
    if controller_running {
        if let Err(e) = controller_handle.await {
            error!("PretzelAI controller task failed: {}", e);
        }
    }

    info!("PretzelAI Operator stopped");
    Ok(())
}

/// Initialize tracing subscriber
fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,pretzelai_operator=debug,kube=warn,hyper=warn")
    });

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for CTRL+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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
