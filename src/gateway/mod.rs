//! WebSocket transport exposing the popup's request bridge to pages.

mod websocket;

use crate::gate::LifecycleGate;
use anyhow::{Context, Result};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use crate::error::TransportError;
use std::sync::Arc;
use tokio::net::TcpListener;

pub use websocket::ws_handler;

#[derive(Clone)]
pub struct GatewayState {
    pub gate: Arc<LifecycleGate>,
}

/// Returns true when the bind address is not a loopback address.
fn is_public_bind(host: &str) -> bool {
    !matches!(
        host,
        "127.0.0.1" | "localhost" | "::1" | "[::1]" | "0:0:0:0:0:0:0:1"
    )
}

pub fn build_app(state: GatewayState) -> Router {
    Router::new()
        .route("/rpc", get(ws_handler))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// GET /health
async fn handle_health(State(state): State<GatewayState>) -> impl IntoResponse {
    let bridge = state.gate.bridge();
    Json(serde_json::json!({
        "status": "ok",
        "surface": state.gate.surface().to_string(),
        "bridge": bridge.is_some(),
        "methods": bridge.map(|b| b.methods()).unwrap_or_default(),
    }))
}

/// Bracketed IPv6 literals are accepted the way they appear in URLs.
fn bind_host(host: &str) -> &str {
    host.trim_matches(['[', ']'])
}

/// Bind `host:port`. Hostnames are resolved, so `localhost` works.
pub async fn bind_gateway(host: &str, port: u16) -> Result<TcpListener, TransportError> {
    if is_public_bind(host) {
        tracing::warn!(host, "gateway is bound to a non-loopback address");
    }
    TcpListener::bind((bind_host(host), port))
        .await
        .map_err(|source| TransportError::Bind {
            addr: format!("{host}:{port}"),
            source,
        })
}

/// Bind `host:port` and serve until the task is dropped.
pub async fn run_gateway(host: &str, port: u16, gate: Arc<LifecycleGate>) -> Result<()> {
    let listener = bind_gateway(host, port).await?;
    run_gateway_with_listener(listener, gate).await
}

/// Serve from a pre-bound listener.
pub async fn run_gateway_with_listener(
    listener: TcpListener,
    gate: Arc<LifecycleGate>,
) -> Result<()> {
    let local = listener.local_addr().map_err(TransportError::Io)?;
    tracing::info!(addr = %local, "gateway listening on ws://{local}/rpc");

    let app = build_app(GatewayState { gate });
    axum::serve(listener, app)
        .await
        .map_err(TransportError::Io)
        .context("serve page gateway")?;
    Ok(())
}
