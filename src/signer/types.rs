//! Signer-side types and error definitions.

use alloy::primitives::{keccak256, Signature, B256, U256};
use alloy::sol_types::{Eip712Domain, SolStruct};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in a signing backend.
#[derive(Debug, Error)]
pub enum SignerError {
    /// Private key material is malformed.
    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    /// The hardware transport could not be opened.
    #[error("Signing device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The device answered with an error (rejected on-device, wrong app, ...).
    #[error("Signing device error: {0}")]
    Device(String),

    /// The device returned a signature that cannot be normalized.
    #[error("Invalid signature from device: {0}")]
    InvalidSignature(String),

    /// The transaction handed to the signer cannot be signed as-is.
    #[error("Cannot sign transaction: {0}")]
    Transaction(String),

    /// Local signing failed.
    #[error("Signing failed: {0}")]
    Signing(String),
}

/// Result type for signer operations.
pub type SignerResult<T> = Result<T, SignerError>;

/// EIP-712 payload reduced to its two hashes.
///
/// `(domain, types, value)` collapse to a domain separator and a struct hash; both backends sign
/// `keccak256(0x1901 ‖ domainSeparator ‖ structHash)`. Hardware devices receive the two hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypedDataHash {
    pub domain_separator: B256,
    pub struct_hash: B256,
}

impl TypedDataHash {
    /// Hash any `sol!` struct under the given domain.
    pub fn new<T: SolStruct>(domain: &Eip712Domain, value: &T) -> Self {
        Self {
            domain_separator: domain.separator(),
            struct_hash: value.eip712_hash_struct(),
        }
    }

    /// The final EIP-712 signing hash.
    pub fn signing_hash(&self) -> B256 {
        let mut buf = [0u8; 66];
        buf[0] = 0x19;
        buf[1] = 0x01;
        buf[2..34].copy_from_slice(self.domain_separator.as_slice());
        buf[34..66].copy_from_slice(self.struct_hash.as_slice());
        keccak256(buf)
    }
}

/// Signature as returned by a device: `v` is a single byte, possibly truncated mod 256.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSignature {
    pub v: u8,
    pub r: B256,
    pub s: B256,
}

impl RawSignature {
    /// Assemble an alloy signature once the recovery parity is known.
    pub fn with_parity(&self, y_parity: bool) -> Signature {
        Signature::new(
            U256::from_be_bytes(self.r.0),
            U256::from_be_bytes(self.s.0),
            y_parity,
        )
    }
}
