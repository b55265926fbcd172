mod cache;
mod config;
mod health;
mod http;
mod index;
mod ingest;
mod metrics;
mod storage;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::cache::locks::NameLocks;
use crate::cache::Resolver;
use crate::config::Config;
use crate::index::{HelmIndexGenerator, IndexGenerator};
use crate::ingest::Ingestor;
use crate::metrics::MetricsRegistry;
use crate::storage::{LocalStore, RemoteStore, S3RemoteStore};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "depot", about = "Chart repository server with S3 mirroring")]
struct Cli {
    /// Path to the YAML configuration file.  When omitted, built-in
    /// defaults are used (local-only repository on port 1323).
    #[arg(short, long)]
    config: Option<String>,
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// Global state shared across all request handlers.
///
/// The S3 client inside `remote` is built once at startup and never mutated
/// afterwards; every handler uses it read-only.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub resolver: Resolver,
    pub ingestor: Ingestor,
    pub remote: Option<Arc<dyn RemoteStore>>,
    pub locks: Arc<NameLocks>,
    pub metrics: MetricsRegistry,
}

// ---------------------------------------------------------------------------
// S3 client setup
// ---------------------------------------------------------------------------

async fn build_remote_store(config: &Config) -> Result<Arc<dyn RemoteStore>> {
    let s3 = &config.storage.s3;

    let aws_config = aws_config::from_env()
        .region(aws_config::Region::new(s3.region.clone()))
        .load()
        .await;

    let mut s3_config = aws_sdk_s3::config::Builder::from(&aws_config);
    if s3.force_path_style {
        s3_config = s3_config.force_path_style(true);
    }

    let client = aws_sdk_s3::Client::from_conf(s3_config.build());
    tracing::info!(
        bucket = %s3.bucket,
        region = %s3.region,
        "S3 mirror initialised"
    );

    Ok(Arc::new(S3RemoteStore::new(
        client,
        s3.bucket.clone(),
        s3.prefix.clone(),
    )))
}

// ---------------------------------------------------------------------------
// HTTP server (axum)
// ---------------------------------------------------------------------------

async fn run_http_server(state: AppState) -> Result<()> {
    let listen_addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let app = http::handler::create_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {listen_addr}"))?;

    tracing::info!(%listen_addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Graceful shutdown
// ---------------------------------------------------------------------------

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // ---- CLI ----
    let cli = Cli::parse();

    // ---- Config ----
    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };
    let config = Arc::new(config);

    // ---- Tracing ----
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!(config_path = ?cli.config, "starting depot");

    // ---- Ensure chart directory exists ----
    tokio::fs::create_dir_all(&config.repo.path)
        .await
        .with_context(|| format!("failed to create chart directory: {}", config.repo.path))?;

    // ---- Initial index generation ----
    // Startup fails hard when the index cannot be built: serving a
    // repository without an index would hand clients an empty catalogue.
    let indexer: Arc<dyn IndexGenerator> = Arc::new(HelmIndexGenerator);
    indexer
        .regenerate(std::path::Path::new(&config.repo.path), &config.repo.base_url)
        .await
        .context("initial repository index generation failed")?;
    tracing::info!(path = %config.repo.path, "repository index initialised");

    // ---- Storage tiers ----
    let local = LocalStore::new(&config.repo.path);

    let remote: Option<Arc<dyn RemoteStore>> = if config.storage.s3.enabled {
        Some(build_remote_store(&config).await?)
    } else {
        tracing::info!("S3 mirroring disabled, serving from local store only");
        None
    };

    // ---- App state ----
    let state = AppState {
        config: Arc::clone(&config),
        resolver: Resolver::new(local.clone(), remote.clone()),
        ingestor: Ingestor::new(
            local,
            remote.clone(),
            indexer,
            config.repo.base_url.clone(),
        ),
        remote,
        locks: Arc::new(NameLocks::new()),
        metrics: MetricsRegistry::new(),
    };

    // ---- Serve ----
    run_http_server(state).await?;

    tracing::info!("depot shut down cleanly");
    Ok(())
}
