//! HTTP API.
//!
//! Thin axum adapters over the engine, store, and ingestion pipeline. The
//! server owns the persistence cadence: a background task flushes the store
//! on the configured interval, and shutdown performs a final flush.

mod routes;

pub use routes::{AppState, router};

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::store::VectorStore;

/// Serves the API until ctrl-c, flushing the store on the configured
/// interval and once more on shutdown.
///
/// # Errors
///
/// Returns an error when the listener cannot bind or the server fails.
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let store = state.store.clone();
    let flush_interval = state.flush_interval;
    let flusher = tokio::spawn(periodic_flush(store.clone(), flush_interval));

    let app = router(state);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "http api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    flusher.abort();
    // Final flush so at most one interval of writes is ever at risk.
    if let Err(err) = tokio::task::spawn_blocking(move || store.flush()).await? {
        error!(error = %err, "final flush failed");
        return Err(err.into());
    }
    Ok(())
}

/// Interval flush loop.
async fn periodic_flush(store: Arc<VectorStore>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let store = Arc::clone(&store);
        let result = tokio::task::spawn_blocking(move || store.flush()).await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "periodic flush failed"),
            Err(err) => warn!(error = %err, "periodic flush task failed"),
        }
    }
}
