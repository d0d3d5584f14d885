//! Streaming transport server
//!
//! Keeps one warm [`ModelHandle`](crate::engine::ModelHandle) and serves it
//! over persistent WebSocket connections:
//! - ws://host:port/ - `{"text": ".."}` in, one binary PCM16 message out
//! - GET /health - Health check
//! - GET /stats - Server and model statistics

mod handlers;
mod protocol;
mod routes;
mod state;

pub use protocol::{parse_request, ErrorResponse, SynthesisRequest};
pub use routes::create_router;
pub use state::{AppState, ServerStats, StatsSnapshot};

use anyhow::{Context, Result};
use std::future::Future;
use tokio::net::TcpListener;
use tracing::info;

/// Bind the listening socket
pub async fn bind(bind: &str, port: u16) -> Result<TcpListener> {
    let addr = format!("{}:{}", bind, port);
    TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))
}

/// Serve connections until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = listener.local_addr().context("Listener has no local address")?;
    info!("TTS server ready and listening on ws://{}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("TTS server failed")?;

    info!("TTS server stopped");
    Ok(())
}
