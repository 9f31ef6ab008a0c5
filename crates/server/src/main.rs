//! swcache server entry point.
//!
//! Boots the caching worker behind an intercepting HTTP proxy, plus the
//! OAuth token-exchange relay on a listener of its own.
//! Logging goes to stderr as JSON.

use std::sync::Arc;

use anyhow::{Context, Result};
use swcache_client::{FetchClient, FetchConfig};
use swcache_core::{AppConfig, CacheDb};
use swcache_worker::{ClientRegistry, Worker, WorkerConfig};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod control;
mod error;
mod platform;
mod proxy;
mod relay;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    tracing::info!(version = %config.version, origin = %config.app_origin, "starting swcache");

    let store = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache store at {}", config.db_path.display()))?;
    let network = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let worker = Arc::new(Worker::new(
        WorkerConfig::try_from(&config)?,
        store.clone(),
        network,
        Arc::new(platform::LoggingPlatform),
        ClientRegistry::new(),
    ));

    match worker.start().await {
        Ok((installed, activated)) => tracing::info!(
            cached = installed.cached.len(),
            failed = installed.failed.len(),
            active = activated.is_some(),
            "worker started"
        ),
        // The proxy still runs; requests pass through untouched.
        Err(e) => tracing::error!(error = %e, "worker failed to install"),
    }

    if let Err(e) = config.require_relay_credentials() {
        tracing::warn!(error = %e, "token exchanges will fail until credentials are set");
    }
    let relay_state = relay::RelayState::from_config(&config)?;
    let proxy_state = proxy::ProxyState::new(worker.clone(), config.origin()?, config.max_bytes);

    let proxy_listener = TcpListener::bind(&config.proxy_addr)
        .await
        .with_context(|| format!("binding proxy on {}", config.proxy_addr))?;
    let relay_listener = TcpListener::bind(&config.relay.addr)
        .await
        .with_context(|| format!("binding relay on {}", config.relay.addr))?;
    tracing::info!(proxy = %config.proxy_addr, relay = %config.relay.addr, "listening");

    let proxy = axum::serve(proxy_listener, proxy::router(proxy_state)).with_graceful_shutdown(shutdown_signal());
    let relay = axum::serve(relay_listener, relay::router(relay_state)).with_graceful_shutdown(shutdown_signal());
    let (proxy_result, relay_result) = tokio::join!(proxy.into_future(), relay.into_future());
    proxy_result.context("proxy server")?;
    relay_result.context("relay server")?;

    worker.shutdown().await;
    store.close().await?;
    tracing::info!("stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
