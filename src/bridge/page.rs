use super::envelope::{CallEnvelope, ReplyEnvelope};
use super::{RequestBridge, handle_frame};
use crate::error::RequestError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};

#[derive(Default)]
struct PendingCalls {
    closed: bool,
    waiting: HashMap<u64, oneshot::Sender<ReplyEnvelope>>,
}

/// Page-side end of the envelope channel.
///
/// Frames are plain JSON strings so the same client works over an in-process
/// channel or any text transport a caller adapts to a pair of queues.
pub struct PageClient {
    outgoing: mpsc::UnboundedSender<String>,
    pending: Arc<Mutex<PendingCalls>>,
    next_id: AtomicU64,
}

impl PageClient {
    /// Start routing replies from `incoming` to their callers.
    pub fn over_channels(
        outgoing: mpsc::UnboundedSender<String>,
        mut incoming: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        let pending = Arc::new(Mutex::new(PendingCalls::default()));
        let router = Arc::clone(&pending);
        tokio::spawn(async move {
            while let Some(frame) = incoming.recv().await {
                let reply = match serde_json::from_str::<ReplyEnvelope>(&frame) {
                    Ok(reply) => reply,
                    Err(error) => {
                        tracing::debug!("dropping unreadable reply frame: {error}");
                        continue;
                    }
                };
                let waiter = match router.lock() {
                    Ok(mut calls) => calls.waiting.remove(&reply.id),
                    Err(_) => break,
                };
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send(reply);
                    }
                    None => tracing::debug!(id = reply.id, "reply for unknown call"),
                }
            }
            // Dropping the senders fails every outstanding call.
            if let Ok(mut calls) = router.lock() {
                calls.closed = true;
                calls.waiting.clear();
            }
        });

        Self {
            outgoing,
            pending,
            next_id: AtomicU64::new(1),
        }
    }

    /// Call a bridge method and wait for its correlated reply.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RequestError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = serde_json::to_string(&CallEnvelope {
            id,
            method: method.to_string(),
            params,
        })
        .map_err(|e| RequestError::InvalidRequest(format!("params do not encode: {e}")))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let mut calls = self.pending.lock().map_err(|_| RequestError::Disconnected)?;
            if calls.closed {
                return Err(RequestError::Disconnected);
            }
            calls.waiting.insert(id, reply_tx);
        }

        if self.outgoing.send(frame).is_err() {
            if let Ok(mut calls) = self.pending.lock() {
                calls.waiting.remove(&id);
            }
            return Err(RequestError::Disconnected);
        }

        reply_rx
            .await
            .map_err(|_| RequestError::Disconnected)?
            .into_result()
    }

    #[cfg(test)]
    fn waiting_calls(&self) -> usize {
        self.pending.lock().map_or(0, |calls| calls.waiting.len())
    }
}

/// Extension-side frame loop: answer every call frame from `incoming` on
/// `outgoing`. Calls run concurrently, so replies may leave out of order.
///
/// The bridge is resolved per frame through `bridge`, letting a surface
/// gain or lose its bridge while the connection stays open.
pub async fn serve_frames<F>(
    bridge: F,
    mut incoming: mpsc::UnboundedReceiver<String>,
    outgoing: mpsc::UnboundedSender<String>,
) where
    F: Fn() -> Option<Arc<RequestBridge>> + Send + Sync + 'static,
{
    while let Some(frame) = incoming.recv().await {
        let bridge = bridge();
        let outgoing = outgoing.clone();
        tokio::spawn(async move {
            let reply = handle_frame(bridge.as_deref(), &frame).await;
            let _ = outgoing.send(reply.to_json());
        });
    }
}

/// Connect a page client straight to `bridge` inside this process.
pub fn in_process_pair(bridge: Option<Arc<RequestBridge>>) -> PageClient {
    let (call_tx, call_rx) = mpsc::unbounded_channel();
    let (reply_tx, reply_rx) = mpsc::unbounded_channel();
    tokio::spawn(serve_frames(move || bridge.clone(), call_rx, reply_tx));
    PageClient::over_channels(call_tx, reply_rx)
}
