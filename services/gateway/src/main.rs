use anyhow::Context;
use clap::Parser;
use gateway::background::Background;
use gateway::snapshots::SnapshotStore;
use gateway::{AppState, GatewayConfig, create_router};
use marketplace::Marketplace;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &GatewayConfig) {
    let filter = match &config.log_filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = GatewayConfig::parse();
    init_tracing(&config);
    config.validate()?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Gateway API service");

    let store = config.data_dir.as_deref().map(|dir| {
        Arc::new(SnapshotStore::new(
            dir,
            config.snapshot_compress,
            config.snapshot_retain,
            config.snapshot_min_changes,
        ))
    });
    if store.is_none() {
        tracing::warn!("no data directory configured, documents will not be persisted");
    }

    let (market, revision) = match &store {
        Some(store) => match store.restore()? {
            Some(restored) => (restored.market, restored.revision),
            None => (Marketplace::new(), 0),
        },
        None => (Marketplace::new(), 0),
    };
    tracing::info!(documents = ?market.stats(), revision, "engine ready");

    let bind = config.bind;
    let state = AppState::new(config, market, revision);
    let background = Background::start(state.clone(), store.clone());
    let app = create_router(state.clone());

    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {}", bind))?;
    tracing::info!("Listening on {}", bind);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    background.stop().await;
    if let Some(store) = store {
        store
            .snapshot(&state, true)
            .await
            .context("writing final snapshot")?;
    }
    tracing::info!("Gateway stopped");
    Ok(())
}
