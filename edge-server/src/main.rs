//! xmcl-edge binary entry point.
//!
//! Usage:
//! ```bash
//! xmcl-edge --config edge.toml
//! xmcl-edge --help
//! ```

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use xmcl_edge_server::cleanup::spawn_cleanup_task;
use xmcl_edge_server::config::Config;
use xmcl_edge_server::error::BackendError;
use xmcl_edge_server::http::build_router;
use xmcl_edge_server::server::{EdgeMetrics, EdgeServer};
use xmcl_edge_server::storage::{SqliteStore, TranslationStore};
use xmcl_edge_server::translation::{spawn_translation_worker, ChatBackend, TranslationPipeline};

/// Group relay and translation cache server for XMCL.
#[derive(Parser, Debug)]
#[command(name = "xmcl-edge")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "edge.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xmcl_edge_server=debug,tower_http=debug,info".into()),
        )
        .init();

    let args = Args::parse();
    info!("xmcl-edge v{}", env!("CARGO_PKG_VERSION"));

    let config = match Config::from_file(&args.config) {
        Ok(config) => config,
        Err(e) if e.is_not_found() => {
            warn!("{} not found, using default configuration", args.config.display());
            Config::default()
        }
        Err(e) => return Err(e.into()),
    };

    let store: Arc<dyn TranslationStore> = Arc::new(
        SqliteStore::new(&config.storage.database)
            .await
            .with_context(|| format!("opening {}", config.storage.database.display()))?,
    );
    info!("Translation cache: {}", config.storage.database.display());

    let backend = match ChatBackend::from_config(&config.translation) {
        Ok(backend) => backend,
        Err(e @ BackendError::MissingApiKey(_)) => {
            warn!("{}; backend calls will be unauthenticated", e);
            ChatBackend::new(&config.translation, None)?
        }
        Err(e) => return Err(e.into()),
    };

    let metrics = Arc::new(EdgeMetrics::default());
    let (pipeline, jobs) = TranslationPipeline::new(
        store.clone(),
        metrics.clone(),
        config.translation.queue_capacity,
    );
    let worker = spawn_translation_worker(
        jobs,
        store.clone(),
        Arc::new(backend),
        config.translation.clone(),
        metrics.clone(),
    );
    let cleanup = spawn_cleanup_task(store.clone(), config.cleanup.clone());

    let bind_address = config.server.bind_address.clone();
    let server = Arc::new(EdgeServer::new(config, store, pipeline, metrics));
    let app = build_router(server);

    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("binding {}", bind_address))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cleanup.abort();
    worker.abort();
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
