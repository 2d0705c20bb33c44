//! Medlens HTTP server.

use std::net::SocketAddr;

use medlens::config::Config;
use medlens::startup::build_app;
use medlens_telemetry::{capture_error, init_metrics, setup_telemetry};
use tokio::signal;
use tracing::{error, info};

/// Build version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::init()?;
    let telemetry = setup_telemetry(&config.telemetry());
    let metrics_handle = init_metrics();

    info!(
        version = VERSION,
        address = %config.http_address,
        otlp = config.otlp_endpoint.is_some(),
        pid = std::process::id(),
        "Starting medlens"
    );

    let result = run(&config, metrics_handle).await;
    if let Err(e) = &result {
        error!(error = %e, "Server failed");
        capture_error(e);
    }

    telemetry.shutdown();
    info!("Shutdown complete");
    result
}

async fn run(
    config: &Config,
    metrics_handle: medlens_telemetry::PrometheusHandle,
) -> anyhow::Result<()> {
    let (app, addr) = build_app(config, metrics_handle).await?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
