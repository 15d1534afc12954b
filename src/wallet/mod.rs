//! The opaque signing capability a machine calls after approval.

pub mod local;

pub use local::LocalKeyWallet;

use anyhow::Result;
use std::future::Future;
use std::pin::Pin;

/// A transfer the user approved, with the draft fields resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub origin: String,
    pub to: String,
    pub asset_id: String,
    pub amount: u64,
    pub fee: u64,
}

/// Key custody and signing. Never sees a request that was not approved.
pub trait Wallet: Send + Sync {
    fn name(&self) -> &str;

    /// Sign `message` on behalf of `origin`; returns a `0x`-prefixed signature.
    fn sign_message<'a>(
        &'a self,
        origin: &'a str,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

    /// Submit a transfer; returns its `0x`-prefixed transaction id.
    fn send_transaction<'a>(
        &'a self,
        transfer: &'a Transfer,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}
