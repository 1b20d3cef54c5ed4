//! fba-vote - awards voting service
//!
//! Serves the category vote endpoints, session reset, voter finalization,
//! results and admin voter management over HTTP, backed by one SQLite
//! database in the root folder.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fba_common::config::{self, ROOT_FOLDER_ENV};
use fba_common::db::init_database;
use fba_vote::{build_router, AppState};

const DEFAULT_PORT: u16 = 5780;
const DEFAULT_BIND: &str = "127.0.0.1";

/// Command-line arguments for fba-vote
#[derive(Parser, Debug)]
#[command(name = "fba-vote")]
#[command(about = "Floorball awards voting service")]
#[command(version)]
struct Args {
    /// Port to listen on [default: 5780]
    #[arg(short, long, env = "FBA_PORT")]
    port: Option<u16>,

    /// Address to bind [default: 127.0.0.1]
    #[arg(short, long, env = "FBA_BIND")]
    bind: Option<String>,

    /// Root folder holding fba.db (also read from FBA_ROOT_FOLDER)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, env = "FBA_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fba_vote=info,fba_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting fba-vote v{}", env!("CARGO_PKG_VERSION"));

    let config_path = args.config.clone().or_else(config::default_config_path);
    let toml_config = config::load_toml_config(config_path.as_deref())
        .context("Failed to load config file")?;

    let root_folder =
        config::resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &toml_config);
    let db_path = config::prepare_root_folder(&root_folder)
        .with_context(|| format!("Failed to prepare root folder {}", root_folder.display()))?;
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path, &toml_config.database)
        .await
        .context("Failed to initialize database")?;
    info!("✓ Database ready");

    let state = AppState::new(pool, toml_config.retry.clone(), toml_config.finalize.clone());
    let app = build_router(state);

    let port = args.port.or(toml_config.server.port).unwrap_or(DEFAULT_PORT);
    let bind = args
        .bind
        .or_else(|| toml_config.server.bind.clone())
        .unwrap_or_else(|| DEFAULT_BIND.to_string());
    let addr = format!("{}:{}", bind, port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("fba-vote listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
