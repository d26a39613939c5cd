use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

mod api;
mod cache;
mod config;
mod refresh;
mod sports;

use api::AppState;
use cache::MatchCache;
use config::Config;
use refresh::{Refresher, Shutdown};
use sports::{MatchSource, SportScoreClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let source: Arc<dyn MatchSource> = Arc::new(SportScoreClient::new(
        &config.sports_api_host,
        &config.sports_api_key,
        config.request_timeout(),
    )?);
    info!("Using {} at {}", source.name(), config.sports_api_host);

    let cache = MatchCache::new();
    let refresher = Arc::new(Refresher::new(
        source,
        cache.clone(),
        config.fetch_deadline(),
    ));
    let (stop_tx, shutdown) = Shutdown::channel();

    // Fill the cache before serving so readers don't see empty keys that
    // are about to succeed.
    let report = refresher.run_once(&shutdown).await;
    if let Some((key, error)) = report.first_error() {
        warn!("Initial refresh incomplete, first failure {}: {}", key, error);
    }

    let refresh_task = refresher
        .clone()
        .spawn(config.refresh_interval(), shutdown.clone());

    let app = api::router(AppState {
        cache,
        refresher: refresher.clone(),
    });
    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", config.listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down, stopping refresher");
    let _ = stop_tx.send(true);
    if tokio::time::timeout(config.graceful_shutdown(), refresh_task)
        .await
        .is_err()
    {
        warn!(
            "Refresher did not stop within {:?}",
            config.graceful_shutdown()
        );
    }
    info!("Server exiting");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
