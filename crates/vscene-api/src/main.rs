//! Axum API server binary.

use std::net::SocketAddr;

use anyhow::{anyhow, Context};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vscene_api::{create_router, metrics, ApiConfig, AppState};
use vscene_media::FfmpegToolkit;
use vscene_worker::{RegistrySweeper, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    init_tracing()?;

    info!("Starting vscene-api");

    let config = ApiConfig::from_env();
    let worker_config = WorkerConfig::from_env();
    info!(
        host = %config.host,
        port = config.port,
        provider = ?worker_config.provider,
        max_concurrent_jobs = worker_config.max_concurrent_jobs,
        "Loaded configuration"
    );

    if let Err(e) = FfmpegToolkit::new().check_available() {
        warn!("Media toolchain unavailable, jobs will fail: {}", e);
    }

    let metrics_handle = if config.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics().context("failed to install Prometheus recorder")?)
    } else {
        None
    };

    let (job_ttl, sweep_interval) = (worker_config.job_ttl, worker_config.sweep_interval);
    let state = AppState::new(config.clone(), worker_config)
        .context("failed to create application state")?;

    RegistrySweeper::new(state.orchestrator.registry(), job_ttl, sweep_interval).spawn();

    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("vscene=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
