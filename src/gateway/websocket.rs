use super::GatewayState;
use crate::bridge::serve_frames;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

/// GET /rpc: one call envelope per text frame in, one reply per frame out.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<GatewayState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: GatewayState) {
    let (mut sink, mut stream) = socket.split();
    let (call_tx, call_rx) = mpsc::unbounded_channel::<String>();
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<String>();
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<axum::body::Bytes>();

    let writer = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                Some(reply) = reply_rx.recv() => Message::Text(reply.into()),
                Some(data) = pong_rx.recv() => Message::Pong(data),
                else => break,
            };
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    let gate = Arc::clone(&state.gate);
    let frames = tokio::spawn(serve_frames(move || gate.bridge(), call_rx, reply_tx));

    tracing::debug!("page connected");
    while let Some(result) = stream.next().await {
        let message = match result {
            Ok(message) => message,
            Err(error) => {
                tracing::debug!("websocket receive error: {error}");
                break;
            }
        };

        match message {
            Message::Text(text) => {
                if call_tx.send(text.as_str().to_owned()).is_err() {
                    break;
                }
            }
            Message::Ping(data) => {
                let _ = pong_tx.send(data);
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    tracing::debug!("page disconnected");

    // Calls already dispatched keep running inside their State Stores; only
    // the reply path goes away with the socket.
    drop(call_tx);
    drop(pong_tx);
    let _ = frames.await;
    writer.abort();
}
