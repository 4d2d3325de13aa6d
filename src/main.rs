use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use storefront_guard::cli::Args;
use storefront_guard::config::{LogFormat, LoggingConfig};
use storefront_guard::http::HttpServer;
use storefront_guard::ratelimit::RateLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = args.load_config()?;

    init_tracing(&config.logging);

    info!("Starting Storefront Guard");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        http_addr = %config.server.http_addr,
        sweep_interval_secs = config.rate_limiting.sweep_interval_secs,
        "Configuration loaded"
    );
    warn!("Rate limit counts are per process; running several instances multiplies every limit");

    let rate_limiter = Arc::new(RateLimiter::new());
    rate_limiter.start_sweeper(config.rate_limiting.sweep_interval());
    info!("Rate limiter initialized");

    let result = HttpServer::new(config.server.http_addr, rate_limiter.clone())
        .serve_with_shutdown(shutdown_signal())
        .await;

    rate_limiter.shutdown();
    result?;

    info!("Storefront Guard stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    match logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init(),
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
