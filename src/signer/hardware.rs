//! Hardware-backed signer.
//!
//! The device session is opened lazily on first use and held until [`HardwareSigner::close`].
//! Devices report the recovery id as a single byte, so for legacy EIP-155 transactions the full
//! `v` has to be reconstructed from the chain id before the signature can be used.

use alloy::primitives::{Address, Bytes, Signature, B256};
use async_trait::async_trait;
use tokio::sync::{Mutex, OnceCell};

use crate::observability::metrics;
use crate::signer::transport::{DeviceSession, DeviceTransport};
use crate::signer::types::{RawSignature, SignerError, SignerResult, TypedDataHash};
use crate::signer::ChainSigner;
use crate::transaction::types::BaseTx;

/// Recover the full EIP-155 `v` from the byte a device returned.
///
/// The device computes `v = 2*chainId + 35 + parity` and keeps only the low byte. Adding a
/// multiple of 256 large enough to keep the intermediate non-negative and reducing mod 256
/// yields the parity offset again.
pub fn normalize_legacy_v(v_returned: u8, chain_id: u64) -> u128 {
    let base = 2 * chain_id as u128 + 35;
    let k = base / 256 + 1;
    let offset = (v_returned as u128 + k * 256 - base) % 256;
    base + offset
}

/// Parity bit of a legacy signature after `v` normalization.
fn legacy_parity(v_returned: u8, chain_id: u64) -> SignerResult<bool> {
    let v = normalize_legacy_v(v_returned, chain_id);
    match v - (2 * chain_id as u128 + 35) {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(SignerError::InvalidSignature(format!(
            "v byte {v_returned} does not match chain id {chain_id}"
        ))),
    }
}

/// Parity bit of a typed-transaction signature, where `v` is already 0 or 1.
fn typed_parity(v: u8) -> SignerResult<bool> {
    match v {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(SignerError::InvalidSignature(format!(
            "typed transaction v must be 0 or 1, got {other}"
        ))),
    }
}

/// Parity bit of a message or typed-data signature (27/28, or 0/1 on some firmware).
fn message_parity(v: u8) -> SignerResult<bool> {
    match v {
        0 | 27 => Ok(false),
        1 | 28 => Ok(true),
        other => Err(SignerError::InvalidSignature(format!(
            "message signature v must be 27 or 28, got {other}"
        ))),
    }
}

/// Signer that forwards every request to a hardware device.
pub struct HardwareSigner<T: DeviceTransport> {
    transport: T,
    derivation_path: String,
    session: Mutex<Option<Box<dyn DeviceSession>>>,
    address: OnceCell<Address>,
}

impl<T: DeviceTransport> HardwareSigner<T> {
    /// Create the signer. No device I/O happens until the first request.
    pub fn new(transport: T, derivation_path: impl Into<String>) -> Self {
        Self {
            transport,
            derivation_path: derivation_path.into(),
            session: Mutex::new(None),
            address: OnceCell::new(),
        }
    }

    /// The BIP-32 path this signer uses.
    pub fn derivation_path(&self) -> &str {
        &self.derivation_path
    }

    /// Whether a device session is currently open.
    pub async fn is_open(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Release the device session if one is open. Idempotent.
    pub async fn close(&self) -> SignerResult<()> {
        let session = self.session.lock().await.take();
        if let Some(mut session) = session {
            session.close().await?;
            metrics::record_device_session("close");
            tracing::info!(path = %self.derivation_path, "Hardware session closed");
        }
        Ok(())
    }

    /// Open a new device session through the transport.
    async fn open_session(&self) -> SignerResult<Box<dyn DeviceSession>> {
        match self.transport.open().await {
            Ok(session) => {
                metrics::record_device_session("open");
                tracing::info!(path = %self.derivation_path, "Hardware session opened");
                Ok(session)
            }
            Err(e) => {
                metrics::record_device_session("unavailable");
                Err(e)
            }
        }
    }

    /// Check that a signature recovers to the device's account before handing it out.
    async fn verify(&self, signature: &Signature, prehash: &B256) -> SignerResult<()> {
        let expected = self.get_address().await?;
        let recovered = signature
            .recover_address_from_prehash(prehash)
            .map_err(|e| SignerError::InvalidSignature(e.to_string()))?;
        if recovered != expected {
            return Err(SignerError::InvalidSignature(format!(
                "signature recovers to {recovered}, device account is {expected}"
            )));
        }
        Ok(())
    }
}

fn not_open() -> SignerError {
    SignerError::DeviceUnavailable("device session is not open".into())
}

#[async_trait]
impl<T: DeviceTransport> ChainSigner for HardwareSigner<T> {
    async fn get_address(&self) -> SignerResult<Address> {
        if let Some(address) = self.address.get() {
            return Ok(*address);
        }

        let mut guard = self.session.lock().await;
        if guard.is_none() {
            *guard = Some(self.open_session().await?);
        }
        let session = guard.as_mut().ok_or_else(not_open)?;
        let address = session.address(&self.derivation_path).await?;
        drop(guard);

        // Another caller may have filled the cell meanwhile; both read the same device.
        let _ = self.address.set(address);
        Ok(address)
    }

    async fn sign_message(&self, message: &[u8]) -> SignerResult<Signature> {
        let raw = {
            let mut guard = self.session.lock().await;
            if guard.is_none() {
                *guard = Some(self.open_session().await?);
            }
            let session = guard.as_mut().ok_or_else(not_open)?;
            session.sign_message(&self.derivation_path, message).await?
        };
        let signature = raw.with_parity(message_parity(raw.v)?);
        self.verify(&signature, &alloy::primitives::eip191_hash_message(message))
            .await?;
        Ok(signature)
    }

    async fn sign_typed_data(&self, payload: &TypedDataHash) -> SignerResult<Signature> {
        let raw = {
            let mut guard = self.session.lock().await;
            if guard.is_none() {
                *guard = Some(self.open_session().await?);
            }
            let session = guard.as_mut().ok_or_else(not_open)?;
            session.sign_typed_data(&self.derivation_path, payload).await?
        };
        let signature = raw.with_parity(message_parity(raw.v)?);
        self.verify(&signature, &payload.signing_hash()).await?;
        Ok(signature)
    }

    async fn sign_transaction(&self, tx: &BaseTx) -> SignerResult<Bytes> {
        let unsigned = tx
            .to_unsigned()
            .map_err(|e| SignerError::Transaction(e.to_string()))?;
        let payload = unsigned.encoded_for_signing();

        let raw: RawSignature = {
            let mut guard = self.session.lock().await;
            if guard.is_none() {
                *guard = Some(self.open_session().await?);
            }
            let session = guard.as_mut().ok_or_else(not_open)?;
            session
                .sign_transaction(&self.derivation_path, &payload)
                .await?
        };

        let parity = if tx.is_typed() {
            typed_parity(raw.v)?
        } else {
            legacy_parity(raw.v, tx.chain_id)?
        };
        let signature = raw.with_parity(parity);
        self.verify(&signature, &unsigned.signature_hash()).await?;

        tracing::debug!(
            nonce = tx.nonce,
            chain_id = tx.chain_id,
            tx_type = tx.tx_type,
            "Transaction signed on device"
        );

        Ok(unsigned.into_raw(signature))
    }
}

impl<T: DeviceTransport> Drop for HardwareSigner<T> {
    fn drop(&mut self) {
        if self.session.get_mut().is_some() {
            tracing::warn!(
                path = %self.derivation_path,
                "Hardware signer dropped with an open session; call close() before exit"
            );
        }
    }
}

impl<T: DeviceTransport> std::fmt::Debug for HardwareSigner<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareSigner")
            .field("derivation_path", &self.derivation_path)
            .field("address", &self.address.get())
            .finish()
    }
}
