//! Signing backends.
//!
//! # Data Flow
//! ```text
//! BaseTx / message / typed data
//!     → ChainSigner (uniform four-operation surface)
//!         → local.rs (private key in memory)
//!         → hardware.rs (device session via transport.rs, v normalization)
//!     → signature or raw signed transaction bytes
//! ```
//!
//! # Security Constraints
//! - Private keys only from CLI arguments or environment variables
//! - Never log private keys
//! - Hardware sessions are released explicitly before the process exits

pub mod hardware;
pub mod local;
pub mod transport;
pub mod types;

use alloy::primitives::{Address, Bytes, Signature};
use async_trait::async_trait;

pub use hardware::HardwareSigner;
pub use local::LocalSigner;
pub use transport::{BridgeTransport, DeviceSession, DeviceTransport};
pub use types::{RawSignature, SignerError, SignerResult, TypedDataHash};

use crate::transaction::types::BaseTx;

/// The capability every signing backend provides.
#[async_trait]
pub trait ChainSigner: Send + Sync {
    /// Address of the signing account.
    async fn get_address(&self) -> SignerResult<Address>;

    /// Sign an EIP-191 personal message.
    async fn sign_message(&self, message: &[u8]) -> SignerResult<Signature>;

    /// Sign EIP-712 typed data.
    async fn sign_typed_data(&self, payload: &TypedDataHash) -> SignerResult<Signature>;

    /// Sign a transaction and return the raw EIP-2718 encoding.
    async fn sign_transaction(&self, tx: &BaseTx) -> SignerResult<Bytes>;
}

/// The signer selected on the command line.
#[derive(Debug)]
pub enum SignerBackend {
    Local(LocalSigner),
    Hardware(HardwareSigner<BridgeTransport>),
}

impl SignerBackend {
    /// Release any device session. A no-op for local keys.
    pub async fn close(&self) -> SignerResult<()> {
        match self {
            Self::Local(_) => Ok(()),
            Self::Hardware(signer) => signer.close().await,
        }
    }

    fn inner(&self) -> &dyn ChainSigner {
        match self {
            Self::Local(signer) => signer,
            Self::Hardware(signer) => signer,
        }
    }
}

#[async_trait]
impl ChainSigner for SignerBackend {
    async fn get_address(&self) -> SignerResult<Address> {
        self.inner().get_address().await
    }

    async fn sign_message(&self, message: &[u8]) -> SignerResult<Signature> {
        self.inner().sign_message(message).await
    }

    async fn sign_typed_data(&self, payload: &TypedDataHash) -> SignerResult<Signature> {
        self.inner().sign_typed_data(payload).await
    }

    async fn sign_transaction(&self, tx: &BaseTx) -> SignerResult<Bytes> {
        self.inner().sign_transaction(tx).await
    }
}
