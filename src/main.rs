//! Gateway process bootstrap.

use std::sync::Arc;

use clap::Parser;
use mimalloc::MiMalloc;

use meshgate::config::GatewayConfig;
use meshgate::forwarder::ProxyForwarder;
use meshgate::logging;
use meshgate::proxy_service::{self, AppState};
use meshgate::registry::file::JsonFileStore;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = GatewayConfig::parse();
    logging::init(config.log_format);

    let identity_header = config.identity_header_name()?;
    let store = Arc::new(JsonFileStore::open(&config.store).await?);
    let forwarder = Arc::new(ProxyForwarder::new(
        config.upstream_timeout,
        config.insecure_upstream_tls,
    )?);
    if config.insecure_upstream_tls {
        tracing::warn!("upstream TLS certificate verification is disabled");
    }

    let app = proxy_service::router(AppState {
        store,
        forwarder,
        identity_header,
    });

    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    tracing::info!(
        addr = %config.listen,
        store = %config.store.display(),
        "meshgate listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install ctrl-c handler");
    }
}
