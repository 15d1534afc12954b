//! Lifecycle Gate: owns the single request bridge of a privileged surface.

use crate::bridge::{BridgeServices, RegisteredMethod, RequestBridge};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Which extension context this process is acting as.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RuntimeSurface {
    /// The extension's own popup; the only place a bridge may live.
    Popup,
    #[default]
    Page,
}

impl RuntimeSurface {
    #[must_use]
    pub fn is_privileged(self) -> bool {
        matches!(self, Self::Popup)
    }
}

pub struct LifecycleGate {
    surface: RuntimeSurface,
    bridge: Mutex<Option<Arc<RequestBridge>>>,
    created: AtomicUsize,
}

impl LifecycleGate {
    #[must_use]
    pub fn new(surface: RuntimeSurface) -> Self {
        Self {
            surface,
            bridge: Mutex::new(None),
            created: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn surface(&self) -> RuntimeSurface {
        self.surface
    }

    /// Bind a bridge to `services`, unless one is already live.
    ///
    /// Outside the popup this does nothing and returns `None`.
    pub fn start(&self, services: &BridgeServices) -> anyhow::Result<Option<Arc<RequestBridge>>> {
        self.start_with(|| services.methods())
    }

    /// Same as [`start`](Self::start) with an explicit method set.
    /// `methods` is only called when a bridge is actually built.
    pub fn start_with<F>(&self, methods: F) -> anyhow::Result<Option<Arc<RequestBridge>>>
    where
        F: FnOnce() -> Vec<RegisteredMethod>,
    {
        if !self.surface.is_privileged() {
            tracing::debug!(surface = %self.surface, "bridge start skipped outside popup");
            return Ok(None);
        }

        let mut slot = self.slot();
        if let Some(bridge) = slot.as_ref() {
            return Ok(Some(Arc::clone(bridge)));
        }

        let bridge = self.build(methods())?;
        *slot = Some(Arc::clone(&bridge));
        Ok(Some(bridge))
    }

    /// Swap in a bridge built from `services`, replacing any live one.
    ///
    /// The new bridge is built before the swap, so frames arriving meanwhile
    /// reach the old bridge instead of being refused. Calls on the old bridge
    /// finish there.
    pub fn replace(&self, services: &BridgeServices) -> anyhow::Result<Option<Arc<RequestBridge>>> {
        self.replace_with(|| services.methods())
    }

    /// Same as [`replace`](Self::replace) with an explicit method set.
    pub fn replace_with<F>(&self, methods: F) -> anyhow::Result<Option<Arc<RequestBridge>>>
    where
        F: FnOnce() -> Vec<RegisteredMethod>,
    {
        if !self.surface.is_privileged() {
            return Ok(None);
        }
        let bridge = self.build(methods())?;
        let previous = self.slot().replace(Arc::clone(&bridge));
        if previous.is_some() {
            tracing::info!(surface = %self.surface, "request bridge replaced");
        }
        Ok(Some(bridge))
    }

    fn build(&self, methods: Vec<RegisteredMethod>) -> anyhow::Result<Arc<RequestBridge>> {
        let mut bridge = RequestBridge::new();
        bridge.register(methods)?;
        let bridge = Arc::new(bridge);
        let count = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(
            surface = %self.surface,
            methods = ?bridge.methods(),
            instance = count,
            "request bridge started"
        );
        Ok(bridge)
    }

    /// Current bridge, if started.
    #[must_use]
    pub fn bridge(&self) -> Option<Arc<RequestBridge>> {
        self.slot().clone()
    }

    /// Release the bridge. Calls already dispatched run to completion; new
    /// frames are refused as `unavailable`. Returns whether one was live.
    pub fn teardown(&self) -> bool {
        let released = self.slot().take().is_some();
        if released {
            tracing::info!(surface = %self.surface, "request bridge torn down");
        }
        released
    }

    /// Bridges built over this gate's lifetime.
    #[must_use]
    pub fn instances_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<RequestBridge>>> {
        self.bridge.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
