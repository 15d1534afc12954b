use super::{Transfer, Wallet};
use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

const KEY_LEN: usize = 32;

/// Development wallet: an in-memory HMAC-SHA256 key.
///
/// Signatures are deterministic per key and message, which makes them easy to
/// check in tests. Transactions are not broadcast anywhere.
pub struct LocalKeyWallet {
    key: Zeroizing<Vec<u8>>,
    nonce: AtomicU64,
}

impl LocalKeyWallet {
    /// Fresh random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut key = Zeroizing::new(vec![0u8; KEY_LEN]);
        rand::rng().fill_bytes(&mut key);
        Self::with_key(key)
    }

    /// Key from a hex string (optionally `0x`-prefixed).
    pub fn from_hex(key_hex: &str) -> Result<Self> {
        let trimmed = key_hex.trim();
        let raw = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let key = Zeroizing::new(hex::decode(raw).context("wallet key is not valid hex")?);
        anyhow::ensure!(
            key.len() == KEY_LEN,
            "wallet key must be {KEY_LEN} bytes, got {}",
            key.len()
        );
        Ok(Self::with_key(key))
    }

    /// Use the configured key, or generate one when none is set.
    pub fn from_config(key_hex: Option<&str>) -> Result<Self> {
        match key_hex.filter(|k| !k.trim().is_empty()) {
            Some(key_hex) => Self::from_hex(key_hex),
            None => {
                tracing::info!("no wallet key configured; generated an ephemeral key");
                Ok(Self::generate())
            }
        }
    }

    fn with_key(key: Zeroizing<Vec<u8>>) -> Self {
        Self {
            key,
            nonce: AtomicU64::new(0),
        }
    }

    fn mac(&self, parts: &[&[u8]]) -> Result<String> {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).map_err(|e| anyhow::anyhow!("hmac key: {e}"))?;
        for part in parts {
            mac.update(&(part.len() as u64).to_be_bytes());
            mac.update(part);
        }
        Ok(format!("0x{}", hex::encode(mac.finalize().into_bytes())))
    }
}

impl Wallet for LocalKeyWallet {
    fn name(&self) -> &str {
        "local"
    }

    fn sign_message<'a>(
        &'a self,
        origin: &'a str,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move { self.mac(&[b"sign", origin.as_bytes(), message.as_bytes()]) })
    }

    fn send_transaction<'a>(
        &'a self,
        transfer: &'a Transfer,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
            let id = self.mac(&[
                b"send",
                transfer.origin.as_bytes(),
                transfer.to.as_bytes(),
                transfer.asset_id.as_bytes(),
                &transfer.amount.to_be_bytes(),
                &transfer.fee.to_be_bytes(),
                &nonce.to_be_bytes(),
            ])?;
            tracing::info!(
                to = %transfer.to,
                asset = %transfer.asset_id,
                amount = transfer.amount,
                fee = transfer.fee,
                "transfer signed"
            );
            Ok(id)
        })
    }
}
