use std::sync::Arc;

use anyhow::{Context, Result};
use eventface_core::{BatchOrchestrator, HttpFetcher, IdentityMatcher, ImageProcessor};
use eventface_store::Store;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod server;

use config::Config;
use server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "eventfaced starting");
    let config = Config::from_env();

    let store = Store::open(&config.db_path)
        .await
        .with_context(|| format!("opening database {}", config.db_path.display()))?;
    let identities = store.identity_count().await?;
    tracing::info!(path = %config.db_path.display(), identities, "identity registry ready");

    let engine = engine::spawn_engine(&config.model_dir, config.min_confidence)?;
    let fetcher = HttpFetcher::new(config.retry_policy()).context("building HTTP client")?;
    let processor = ImageProcessor::new(fetcher, engine, IdentityMatcher::new(config.max_distance));
    let orchestrator = BatchOrchestrator::new(processor, config.batch_concurrency);
    let state = Arc::new(AppState::new(orchestrator, store));

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(
        addr = %config.listen_addr,
        max_distance = config.max_distance,
        concurrency = config.batch_concurrency,
        "eventfaced ready"
    );

    axum::serve(listener, server::create_app(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("eventfaced shutting down");
    Ok(())
}
