use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zipper_core::{
    load_config, load_config_from_env, validate_config, ArchivePipeline, Config, HttpFetcher,
    ShutdownOutcome, TaskManager,
};
use zipper_server::api::create_router;
use zipper_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting zipper {}", VERSION);

    let config = load(config_path())?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!(
        max_concurrent = config.task.max_concurrent,
        grace_period_secs = config.shutdown.grace_period_secs,
        "Task limits"
    );
    info!("Archive output directory: {:?}", config.archive.output_dir);

    // Create the download and archive pipeline
    let fetcher = HttpFetcher::new(&config.downloader).context("Failed to create HTTP client")?;
    let pipeline = ArchivePipeline::new(config.archive.clone(), Arc::new(fetcher))
        .with_backoff_unit(config.downloader.backoff_unit());

    let manager = TaskManager::new(config.task.max_concurrent, pipeline);
    let state = Arc::new(AppState::new(config.clone(), manager));

    // Create router
    let app = create_router(Arc::clone(&state));

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Drain in-flight tasks
    let grace = config.shutdown.grace_period();
    info!(grace_secs = grace.as_secs(), "Server stopped, waiting for active tasks");
    match state.manager().shutdown(grace).await {
        ShutdownOutcome::Drained => info!("Shutdown complete"),
        ShutdownOutcome::TimedOut { active } => {
            warn!(active, "Shutdown complete with unfinished tasks")
        }
    }

    Ok(())
}

fn config_path() -> PathBuf {
    std::env::var("ZIPPER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"))
}

/// Load the config file, or defaults plus environment when there is none.
fn load(path: PathBuf) -> Result<Config> {
    if path.exists() {
        info!("Loading configuration from {:?}", path);
        load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))
    } else {
        warn!("Config file {:?} not found, using defaults and environment", path);
        load_config_from_env().context("Failed to load config from environment")
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
