//! fleetsync Discovery Service
//!
//! Keeps an internal registry of deployed service instances in sync with the
//! compute orchestrator, and keeps the managed DNS zone pointing at the
//! manager role's instances.
//!
//! ## Architecture
//!
//! - **Sync Worker**: single-writer actor owning the service cache
//! - **Ticker**: drives periodic reconciliation passes
//! - **Topology Pipeline**: fetch, classify, build per tick
//! - **HTTP API**: read and mutation commands routed through the worker

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fleet_discovery::api;
use fleet_discovery::config::Config;
use fleet_discovery::dns::{DirectorySync, HttpDnsProvider};
use fleet_discovery::provider::HttpCloudProvider;
use fleet_discovery::sync::{spawn_ticker, SyncActor};
use fleet_events::BroadcastBus;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting fleetsync discovery service");

    let config = Config::from_env()?;
    info!(
        cluster = %config.cluster,
        provider_url = %config.provider_url,
        dns_suffix = %config.dns_suffix,
        manager_service_id = config.manager_service_id,
        "Configuration loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let provider = Arc::new(HttpCloudProvider::new(
        &config.provider_url,
        &config.cluster,
    )?);
    let dns = Arc::new(HttpDnsProvider::new(&config.dns_url)?);
    let directory = DirectorySync::new(
        dns,
        config.dns_suffix.clone(),
        config.network_id.clone(),
        config.manager_fqdn(),
    );
    let publisher = Arc::new(BroadcastBus::default());

    let (handle, worker) = SyncActor::spawn(
        config.clone(),
        provider,
        directory,
        publisher,
        shutdown_rx.clone(),
    );
    let ticker = spawn_ticker(handle.clone(), &config, shutdown_rx.clone());

    let app = api::create_router(handle);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, "API listening");

    let server = tokio::spawn({
        let mut shutdown = shutdown_rx.clone();
        async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.changed().await;
                })
                .await
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = server => {
            match result {
                Ok(Ok(())) => info!("API server exited"),
                Ok(Err(e)) => tracing::error!(error = %e, "API server error"),
                Err(e) => tracing::error!(error = %e, "API server task panicked"),
            }
        }
    }

    let _ = shutdown_tx.send(true);

    info!("Waiting for workers to shut down...");
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        let _ = ticker.await;
        let _ = worker.await;
    })
    .await;

    info!("Discovery service shutdown complete");
    Ok(())
}
