//! Request categories and the wallet-backed operation each one runs.

pub mod send;
pub mod sign;

pub use send::{BASE_ASSET_ID, FeeTier, SendCategory, SendDraft, SendEdit, SendInput, SendOutput};
pub use sign::{SignCategory, SignEdit, SignInput, SignOutput};

use crate::error::RequestError;
use crate::machine::PrivilegedOperation;
use crate::wallet::{Transfer, Wallet};
use anyhow::Context;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use url::Url;

/// Reduce a page-supplied origin to `scheme://host[:port]`.
pub fn normalize_origin(raw: &str) -> Result<String, RequestError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RequestError::InvalidRequest(
            "origin must not be empty".to_string(),
        ));
    }
    let url = Url::parse(trimmed)
        .map_err(|e| RequestError::InvalidRequest(format!("origin {trimmed:?}: {e}")))?;
    if url.host_str().is_none() {
        return Err(RequestError::InvalidRequest(format!(
            "origin {trimmed:?} has no host"
        )));
    }
    let origin = url.origin();
    if !origin.is_tuple() {
        return Err(RequestError::InvalidRequest(format!(
            "origin {trimmed:?} is opaque"
        )));
    }
    Ok(origin.ascii_serialization())
}

/// Runs approved requests against a [`Wallet`].
#[derive(Clone)]
pub struct WalletOperation {
    wallet: Arc<dyn Wallet>,
}

impl WalletOperation {
    pub fn new(wallet: Arc<dyn Wallet>) -> Self {
        Self { wallet }
    }
}

impl PrivilegedOperation<SignCategory> for WalletOperation {
    fn execute<'a>(
        &'a self,
        input: &'a SignInput,
        _draft: &'a (),
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<SignOutput>> + Send + 'a>> {
        Box::pin(async move {
            let signed_message = self
                .wallet
                .sign_message(&input.origin, &input.message)
                .await
                .with_context(|| format!("{} wallet failed to sign", self.wallet.name()))?;
            Ok(SignOutput { signed_message })
        })
    }
}

impl PrivilegedOperation<SendCategory> for WalletOperation {
    fn execute<'a>(
        &'a self,
        input: &'a SendInput,
        draft: &'a SendDraft,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<SendOutput>> + Send + 'a>> {
        Box::pin(async move {
            let asset_id = draft.asset.clone().context("no asset selected")?;
            let transfer = Transfer {
                origin: input.origin.clone(),
                to: input.to.clone(),
                asset_id,
                amount: draft.amount,
                fee: draft.fee.unwrap_or(0),
            };
            let transaction_id = self
                .wallet
                .send_transaction(&transfer)
                .await
                .with_context(|| format!("{} wallet failed to send", self.wallet.name()))?;
            Ok(SendOutput { transaction_id })
        })
    }
}
