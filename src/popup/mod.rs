//! The privileged popup surface: stores, wallet, gate and bridge wired
//! together from config.

pub mod prompt;

use crate::bridge::{BridgeServices, RequestBridge};
use crate::categories::{SendCategory, SignCategory, WalletOperation};
use crate::config::Config;
use crate::gate::LifecycleGate;
use crate::machine::{MachineOptions, MachineService, SnapshotStore, open_store};
use crate::wallet::{LocalKeyWallet, Wallet};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

pub use prompt::run_approval_prompt;

pub struct PopupRuntime {
    services: BridgeServices,
    gate: Arc<LifecycleGate>,
    store: Arc<dyn SnapshotStore>,
}

impl PopupRuntime {
    /// Build everything from `config` with the local development wallet.
    pub async fn init(config: &Config) -> Result<Self> {
        let wallet = LocalKeyWallet::from_config(config.wallet.key_hex.as_deref())?;
        Self::init_with_wallet(config, Arc::new(wallet)).await
    }

    /// Build with an explicit wallet capability.
    pub async fn init_with_wallet(config: &Config, wallet: Arc<dyn Wallet>) -> Result<Self> {
        config.validate()?;
        let surface = config.surface.runtime_surface()?;
        let store = open_store(&config.store).await?;
        let options = MachineOptions {
            review_timeout: config.approval.review_timeout(),
            store: Arc::clone(&store),
        };

        let operation = Arc::new(WalletOperation::new(wallet));
        let services = BridgeServices {
            sign: MachineService::<SignCategory>::spawn(operation.clone(), options.clone()).await?,
            send: MachineService::<SendCategory>::spawn(operation, options).await?,
            call_timeout: config.approval.call_timeout(),
        };

        let gate = Arc::new(LifecycleGate::new(surface));
        gate.start(&services)?;
        tracing::info!(
            surface = %surface,
            store = store.name(),
            "popup runtime initialised"
        );

        Ok(Self {
            services,
            gate,
            store,
        })
    }

    #[must_use]
    pub fn services(&self) -> &BridgeServices {
        &self.services
    }

    #[must_use]
    pub fn gate(&self) -> Arc<LifecycleGate> {
        Arc::clone(&self.gate)
    }

    #[must_use]
    pub fn bridge(&self) -> Option<Arc<RequestBridge>> {
        self.gate.bridge()
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn SnapshotStore> {
        Arc::clone(&self.store)
    }

    /// Swap in a bridge built with a new page-side call timeout. Calls running
    /// on the old bridge finish there.
    pub fn rebind(&mut self, call_timeout: Option<Duration>) -> Result<()> {
        self.services.call_timeout = call_timeout;
        self.gate.replace(&self.services)?;
        Ok(())
    }

    /// Release the bridge. Stores keep running until the runtime is dropped.
    pub fn teardown(&self) {
        self.gate.teardown();
    }
}
