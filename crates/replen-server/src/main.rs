//! replen-server - REST API server binary.

use std::net::SocketAddr;

use anyhow::Context;
use replen_core::{BackgroundRuntime, ReplenConfig};
use replen_server::{create_server, AppState};
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
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
            Ok(mut sig) => {
                sig.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(Level::INFO.into())
        .add_directive("replen_server=debug".parse()?);

    let json = std::env::var("REPLEN_LOG_JSON").is_ok_and(|v| v != "0" && v != "false");
    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
    Ok(())
}

fn load_config() -> anyhow::Result<ReplenConfig> {
    match std::env::var("REPLEN_CONFIG") {
        Ok(path) => ReplenConfig::from_file(&path)
            .with_context(|| format!("failed to load config file {}", path)),
        Err(_) => Ok(ReplenConfig::from_env()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing()?;

    let config = load_config()?;
    let addr: SocketAddr = config
        .server
        .bind_address()
        .parse()
        .context("invalid REPLEN_HOST/REPLEN_PORT")?;

    // Create the runtime that owns the registry and scanner
    let runtime = BackgroundRuntime::new(config)?;
    runtime.start().await?;
    info!(
        tick_interval_ms = runtime.config().scanner.tick_interval_ms,
        executor = %runtime.config().executor.kind,
        "Readiness scanner started"
    );

    let state = AppState::new(runtime);
    let app = create_server(state.clone());

    info!("Starting replen-server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            info!("Shutdown signal received, stopping scanner...");
        })
        .await?;

    // Drain the in-flight scan before exiting
    state.runtime().shutdown().await?;

    info!("Server stopped cleanly");
    Ok(())
}
