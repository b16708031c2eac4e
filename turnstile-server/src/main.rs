//! turnstile-server: admission queue over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use turnstile::{QueueEngineBuilder, QueueRuntime};
use turnstile_server::{build_router, AppState, LoggingConfig, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "turnstile-server", version, about)]
struct Cli {
    /// Configuration file (TOML). Defaults to `config/default.toml` if present.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding `bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config =
        ServerConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }

    init_logging(&config.logging);
    run(config).await
}

fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    match logging.format.as_str() {
        "json" => fmt().json().with_env_filter(filter).with_target(true).init(),
        _ => fmt().pretty().with_env_filter(filter).with_target(true).init(),
    }
}

async fn run(config: ServerConfig) -> anyhow::Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting turnstile-server");

    #[cfg(feature = "metrics")]
    turnstile::metrics::init_metrics()?;

    let store = config
        .persistence
        .open_store()
        .await
        .context("failed to open participant store")?;

    let engine = QueueEngineBuilder::new(config.queue.clone())
        .with_store(store)
        .build()
        .await?;

    let runtime = QueueRuntime::new(Arc::new(engine));
    runtime.start().await?;

    let app = build_router(AppState::new(runtime.engine()));
    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address))?;
    tracing::info!(address = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    runtime.shutdown().await?;
    tracing::info!("turnstile-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(err) => {
            tracing::warn!("cannot listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    }
}
