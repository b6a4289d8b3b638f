use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub mod api;
pub mod config;
pub mod storage;

pub use config::{Config, ConfigError};
pub use storage::{RecordId, StoreError, Temperature, TemperatureStore};

/// Shared state handed to every request handler.
pub struct AppState {
    pub store: TemperatureStore,
}

impl AppState {
    pub fn new(store: TemperatureStore) -> Self {
        Self { store }
    }
}

pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.addr()).await?;
    info!("listening on http://{}", listener.local_addr()?);

    let state = Arc::new(AppState::new(TemperatureStore::new()));

    // broadcast channel for shutdown signaling
    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);
    let mut server = tokio::spawn(api::http::run(listener, state, shutdown_rx));

    tokio::select! {
        res = &mut server => return res?,
        res = tokio::signal::ctrl_c() => res?,
    }

    info!("shutdown requested");
    let _ = shutdown_tx.send(());
    server.await??;
    Ok(())
}
