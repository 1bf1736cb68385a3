//! PSX Snapshot Binary
//!
//! Starts the ingestion scheduler and the HTTP query API.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin psx-snapshot
//! ```
//!
//! # Environment Variables
//!
//! - `PSX_CONFIG`: Path to the YAML config file (default: config.yaml;
//!   built-in defaults are used when the file is absent)
//! - `RUST_LOG`: Log level (default: info)
//!
//! Values in the config file may reference further environment variables
//! with `${VAR}` or `${VAR:-default}` syntax.

use std::net::SocketAddr;
use std::sync::Arc;

use psx_snapshot::config::{Config, ConfigError, load_config};
use psx_snapshot::feed::FeedClient;
use psx_snapshot::reconcile::Reconciler;
use psx_snapshot::scheduler::{Cadence, RefreshScheduler};
use psx_snapshot::server::{QueryServer, create_router};
use psx_snapshot::store::SnapshotStore;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    tracing::info!("Starting PSX snapshot service");

    let config = resolve_config()?;
    log_config(&config);

    let store = Arc::new(SnapshotStore::connect(&config.persistence).await?);
    let client = FeedClient::new(&config.feeds)?;
    let cadence = Cadence::from_config(&config.scheduler);

    let shutdown_token = CancellationToken::new();

    let scheduler = RefreshScheduler::new(
        client,
        Reconciler::default(),
        Arc::clone(&store),
        cadence,
    );
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_token.clone()));

    let app = create_router(QueryServer::new(store));
    let addr: SocketAddr =
        format!("{}:{}", config.server.bind_address, config.server.http_port).parse()?;

    tracing::info!(%addr, "HTTP server starting");
    tracing::info!("Endpoints:");
    tracing::info!("  GET /health");
    tracing::info!("  GET /psx-data");
    tracing::info!("  GET /psx-data/live");
    tracing::info!("  GET /psx-data/last-updated");
    tracing::info!("  GET /psx-data/stock?symbol=SYMBOL");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown_token.cancel();
    let _ = scheduler_handle.await;

    tracing::info!("PSX snapshot service stopped");
    Ok(())
}

/// Initialize the tracing subscriber with environment filter.
///
/// Uses static directive strings that are compile-time constants guaranteed to parse.
#[allow(clippy::expect_used)]
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(
                    "psx_snapshot=info"
                        .parse()
                        .expect("static directive 'psx_snapshot=info' is valid"),
                )
                .add_directive(
                    "tower_http=info"
                        .parse()
                        .expect("static directive 'tower_http=info' is valid"),
                ),
        )
        .init();
}

/// Load configuration, falling back to built-in defaults when no file exists.
///
/// A file that exists but fails to parse or validate is a hard error; silent
/// fallback there would mask a typo with the defaults.
fn resolve_config() -> anyhow::Result<Config> {
    let path = std::env::var("PSX_CONFIG").ok();

    match load_config(path.as_deref()) {
        Ok(config) => Ok(config),
        Err(ConfigError::ReadError { path, source })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            tracing::info!(%path, "No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Log the effective configuration.
fn log_config(config: &Config) {
    tracing::info!(
        bind_address = %config.server.bind_address,
        http_port = config.server.http_port,
        market_watch_url = %config.feeds.market_watch_url,
        symbols_url = %config.feeds.symbols_url,
        db_path = %config.persistence.db_path,
        scheduler_mode = ?config.scheduler.mode,
        "Configuration loaded"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. Failure to install them
/// would leave the process unable to respond to termination signals, so
/// failing fast at startup is preferable.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
