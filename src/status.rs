//! Diagnostic status endpoint.
//!
//! `GET /api/status` returns the orchestrator's latest [`StatusSnapshot`].
//! Read-only; nothing here can change the session.

use std::net::SocketAddr;

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::LinkError;
use crate::session::StatusSnapshot;

/// Builds the router serving `GET /api/status`.
pub fn router(status: watch::Receiver<StatusSnapshot>) -> Router {
    Router::new()
        .route("/api/status", get(handle_status))
        .with_state(status)
}

async fn handle_status(
    State(status): State<watch::Receiver<StatusSnapshot>>,
) -> Json<StatusSnapshot> {
    Json(status.borrow().clone())
}

/// Normalises a `--status` value. A bare port or `:port` binds loopback.
///
/// # Errors
///
/// Returns `LinkError::InvalidSpec` if the result is not a socket address.
pub fn parse_bind_addr(input: &str) -> Result<SocketAddr, LinkError> {
    let addr = if input.starts_with(':') {
        format!("127.0.0.1{input}")
    } else if input.parse::<u16>().is_ok() {
        format!("127.0.0.1:{input}")
    } else {
        input.to_string()
    };
    addr.parse()
        .map_err(|_| LinkError::InvalidSpec(format!("status address '{input}'")))
}

/// Binds `addr` and serves the status route until `cancel` fires.
///
/// Returns the bound address and the server task.
///
/// # Errors
///
/// Returns `LinkError::ConnectionFailed` if the address cannot be bound.
pub async fn spawn(
    addr: SocketAddr,
    status: watch::Receiver<StatusSnapshot>,
    cancel: CancellationToken,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), LinkError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| LinkError::ConnectionFailed(format!("status bind failed: {e}")))?;
    let bound = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        info!(%bound, "status endpoint listening");
        axum::serve(listener, router(status))
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
            })
            .await
            .ok();
        debug!("status endpoint shut down");
    });
    Ok((bound, handle))
}
