//! Inbound Request Bridge: named page-callable methods relayed into State
//! Stores.

pub mod envelope;
pub mod methods;
pub mod page;
pub mod relay;

pub use envelope::{CallEnvelope, MALFORMED_FRAME_ID, ReplyEnvelope, WireError};
pub use methods::{
    BridgeServices, SEND_TRANSACTION, SIGN_MESSAGE, send_request_methods, sign_request_methods,
};
pub use page::{PageClient, in_process_pair, serve_frames};
pub use relay::RelayMethod;

use crate::error::RequestError;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// One externally callable method.
pub trait MethodHandler: Send + Sync {
    /// Category whose State Store this method drives, for logs.
    fn category(&self) -> &'static str;

    fn call<'a>(
        &'a self,
        params: Value,
    ) -> Pin<Box<dyn Future<Output = Result<Value, RequestError>> + Send + 'a>>;
}

/// A name/handler pair handed to [`RequestBridge::register`].
#[derive(Clone)]
pub struct RegisteredMethod {
    pub name: &'static str,
    pub handler: Arc<dyn MethodHandler>,
}

impl RegisteredMethod {
    pub fn new(name: &'static str, handler: Arc<dyn MethodHandler>) -> Self {
        Self { name, handler }
    }
}

/// Method table living in the privileged surface.
#[derive(Default)]
pub struct RequestBridge {
    methods: HashMap<&'static str, Arc<dyn MethodHandler>>,
}

impl RequestBridge {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a set of methods. A name may only be registered once.
    pub fn register(
        &mut self,
        methods: impl IntoIterator<Item = RegisteredMethod>,
    ) -> anyhow::Result<()> {
        for method in methods {
            anyhow::ensure!(
                !self.methods.contains_key(method.name),
                "bridge method {} is already registered",
                method.name
            );
            tracing::debug!(
                method = method.name,
                category = method.handler.category(),
                "registered bridge method"
            );
            self.methods.insert(method.name, method.handler);
        }
        Ok(())
    }

    /// Sorted list of registered method names.
    #[must_use]
    pub fn methods(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.methods.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Run one method to completion.
    pub async fn invoke(&self, name: &str, params: Value) -> Result<Value, RequestError> {
        let Some(handler) = self.methods.get(name) else {
            tracing::warn!(method = name, "call to unknown bridge method");
            return Err(RequestError::MethodNotFound(name.to_string()));
        };
        let result = handler.call(params).await;
        match &result {
            Ok(_) => tracing::info!(method = name, category = handler.category(), "bridge call resolved"),
            Err(error) => tracing::info!(
                method = name,
                category = handler.category(),
                code = error.code(),
                "bridge call rejected: {error}"
            ),
        }
        result
    }

    /// Answer one call envelope with a reply carrying the same id.
    pub async fn dispatch(&self, call: CallEnvelope) -> ReplyEnvelope {
        let result = self.invoke(&call.method, call.params).await;
        ReplyEnvelope::from_result(call.id, result)
    }
}

/// Decode and answer one raw text frame.
///
/// `bridge` is `None` when the surface has no live bridge; every call is then
/// refused as `unavailable`.
pub async fn handle_frame(bridge: Option<&RequestBridge>, frame: &str) -> ReplyEnvelope {
    let call = match serde_json::from_str::<CallEnvelope>(frame) {
        Ok(call) => call,
        Err(error) => {
            tracing::debug!("malformed call frame: {error}");
            return ReplyEnvelope::err(
                MALFORMED_FRAME_ID,
                &RequestError::InvalidRequest(format!("malformed frame: {error}")),
            );
        }
    };
    match bridge {
        Some(bridge) => bridge.dispatch(call).await,
        None => ReplyEnvelope::err(
            call.id,
            &RequestError::Unavailable("no request bridge in this surface".to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo {
        calls: AtomicUsize,
    }

    impl MethodHandler for Echo {
        fn category(&self) -> &'static str {
            "echo"
        }

        fn call<'a>(
            &'a self,
            params: Value,
        ) -> Pin<Box<dyn Future<Output = Result<Value, RequestError>> + Send + 'a>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(params)
            })
        }
    }

    fn echo_bridge() -> (RequestBridge, Arc<Echo>) {
        let echo = Arc::new(Echo {
            calls: AtomicUsize::new(0),
        });
        let mut bridge = RequestBridge::new();
        bridge
            .register([RegisteredMethod::new("echo", echo.clone())])
            .unwrap();
        (bridge, echo)
    }

    #[test]
    fn duplicate_registration_is_refused() {
        let (mut bridge, echo) = echo_bridge();
        let err = bridge
            .register([RegisteredMethod::new("echo", echo)])
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
        assert_eq!(bridge.methods(), vec!["echo"]);
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let (bridge, echo) = echo_bridge();
        let err = bridge.invoke("nope", json!({})).await.unwrap_err();
        assert_eq!(err, RequestError::MethodNotFound("nope".into()));
        assert_eq!(echo.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dispatch_keeps_correlation_id() {
        let (bridge, _) = echo_bridge();
        let reply = bridge
            .dispatch(CallEnvelope {
                id: 42,
                method: "echo".into(),
                params: json!({ "x": 1 }),
            })
            .await;
        assert_eq!(reply, ReplyEnvelope::ok(42, json!({ "x": 1 })));
    }

    #[tokio::test]
    async fn malformed_frame_answers_with_id_zero() {
        let (bridge, _) = echo_bridge();
        let reply = handle_frame(Some(&bridge), "{not json").await;
        assert_eq!(reply.id, MALFORMED_FRAME_ID);
        assert_eq!(reply.error.unwrap().code, "invalid_request");
    }

    #[tokio::test]
    async fn frames_without_bridge_are_unavailable() {
        let reply = handle_frame(None, r#"{"id":3,"method":"echo","params":{}}"#).await;
        assert_eq!(reply.id, 3);
        assert_eq!(reply.error.unwrap().code, "unavailable");
    }
}
