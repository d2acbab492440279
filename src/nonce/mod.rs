//! Nonce ledger subsystem.
//!
//! # Data Flow
//! ```text
//! offline build
//!     → ledger.rs get(env, chain, address)   (miss = fatal)
//!     → sign + persist record
//!     → ledger.rs set(env, chain, address, nonce + 1)
//!         → storage.rs (whole-document rewrite, file or memory)
//! ```

pub mod ledger;
pub mod storage;

use alloy::primitives::Address;
use thiserror::Error;

pub use ledger::NonceLedger;
pub use storage::{FileStorage, LedgerDocument, LedgerStorage, MemoryStorage};

/// Errors raised by the nonce ledger.
#[derive(Debug, Error)]
pub enum NonceError {
    /// No nonce recorded for the identity. The operator has to seed the ledger.
    #[error("No nonce recorded for {address} on {chain} in environment '{environment}'; seed the nonce ledger first")]
    NotFound {
        environment: String,
        chain: String,
        address: Address,
    },

    /// Ledger file I/O failure.
    #[error("Nonce ledger I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ledger file is not a valid `{env: {chain: {address: n}}}` document.
    #[error("Nonce ledger format error: {0}")]
    Format(#[from] serde_json::Error),
}
