//! Local private-key signer.
//!
//! # Security
//! - Private keys come from the command line or the `CHAIN_OPS_PRIVATE_KEY` environment variable
//! - Keys are never logged or serialized

use alloy::primitives::{Address, Bytes, Signature, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use async_trait::async_trait;

use crate::signer::types::{SignerError, SignerResult, TypedDataHash};
use crate::signer::ChainSigner;
use crate::transaction::types::BaseTx;

/// Environment variable name for the private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "CHAIN_OPS_PRIVATE_KEY";

/// Signer holding a private key in memory. Every operation is local.
#[derive(Debug, Clone)]
pub struct LocalSigner {
    signer: PrivateKeySigner,
}

impl LocalSigner {
    /// Create a signer from a hex-encoded private key string (with or without 0x prefix).
    pub fn from_private_key(private_key_hex: &str) -> SignerResult<Self> {
        let key_hex = private_key_hex
            .trim()
            .strip_prefix("0x")
            .unwrap_or(private_key_hex.trim());

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| SignerError::InvalidKey(format!("Invalid private key format: {}", e)))?;

        tracing::info!(address = %signer.address(), "Local signer initialized");

        Ok(Self { signer })
    }

    /// Load the signer from `CHAIN_OPS_PRIVATE_KEY`.
    pub fn from_env() -> SignerResult<Self> {
        let private_key = std::env::var(PRIVATE_KEY_ENV_VAR).map_err(|_| {
            SignerError::InvalidKey(format!(
                "Environment variable {} not set",
                PRIVATE_KEY_ENV_VAR
            ))
        })?;

        Self::from_private_key(&private_key)
    }

    /// The signer's address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    fn sign_hash(&self, hash: &B256) -> SignerResult<Signature> {
        self.signer
            .sign_hash_sync(hash)
            .map_err(|e| SignerError::Signing(e.to_string()))
    }
}

#[async_trait]
impl ChainSigner for LocalSigner {
    async fn get_address(&self) -> SignerResult<Address> {
        Ok(self.address())
    }

    async fn sign_message(&self, message: &[u8]) -> SignerResult<Signature> {
        self.signer
            .sign_message_sync(message)
            .map_err(|e| SignerError::Signing(format!("Message signing failed: {}", e)))
    }

    async fn sign_typed_data(&self, payload: &TypedDataHash) -> SignerResult<Signature> {
        self.sign_hash(&payload.signing_hash())
    }

    async fn sign_transaction(&self, tx: &BaseTx) -> SignerResult<Bytes> {
        let unsigned = tx
            .to_unsigned()
            .map_err(|e| SignerError::Transaction(e.to_string()))?;
        let signature = self.sign_hash(&unsigned.signature_hash())?;
        Ok(unsigned.into_raw(signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, U256};

    // Well-known test private key (Anvil's first account)
    const TEST_PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_signer_from_private_key() {
        let signer = LocalSigner::from_private_key(TEST_PRIVATE_KEY).unwrap();
        assert_eq!(
            signer.address().to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_signer_with_0x_prefix() {
        let signer = LocalSigner::from_private_key(&format!("0x{}", TEST_PRIVATE_KEY)).unwrap();
        assert_eq!(
            signer.address(),
            address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
        );
    }

    #[test]
    fn test_invalid_private_key() {
        let result = LocalSigner::from_private_key("invalid_key");
        assert!(matches!(result, Err(SignerError::InvalidKey(_))));
        assert!(result.unwrap_err().to_string().contains("Invalid private key"));
    }

    #[tokio::test]
    async fn test_sign_message_recovers() {
        let signer = LocalSigner::from_private_key(TEST_PRIVATE_KEY).unwrap();
        let message = b"Hello, World!";
        let signature = signer.sign_message(message).await.unwrap();
        assert_eq!(signature.as_bytes().len(), 65);
        assert_eq!(
            signature.recover_address_from_msg(message).unwrap(),
            signer.address()
        );
    }

    #[tokio::test]
    async fn test_sign_legacy_transaction_matches_eip155_example() {
        // Private key and transaction from the EIP-155 specification.
        let signer = LocalSigner::from_private_key(&"46".repeat(32)).unwrap();
        let tx = BaseTx {
            nonce: 9,
            to: address!("3535353535353535353535353535353535353535"),
            value: U256::from(1_000_000_000_000_000_000u128),
            data: Bytes::new(),
            gas_limit: 21_000,
            gas_price: Some(20_000_000_000),
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            chain_id: 1,
            tx_type: 0,
        };

        let raw = signer.sign_transaction(&tx).await.unwrap();
        assert_eq!(
            alloy::hex::encode_prefixed(&raw),
            "0xf86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        );
    }

    #[tokio::test]
    async fn test_sign_eip1559_transaction_is_typed_envelope() {
        let signer = LocalSigner::from_private_key(TEST_PRIVATE_KEY).unwrap();
        let tx = BaseTx {
            nonce: 0,
            to: address!("3535353535353535353535353535353535353535"),
            value: U256::ZERO,
            data: Bytes::from_static(&[0xde, 0xad]),
            gas_limit: 50_000,
            gas_price: None,
            max_fee_per_gas: Some(30_000_000_000),
            max_priority_fee_per_gas: Some(1_000_000_000),
            chain_id: 31337,
            tx_type: 2,
        };

        let raw = signer.sign_transaction(&tx).await.unwrap();
        assert_eq!(raw[0], 0x02);

        let again = signer.sign_transaction(&tx).await.unwrap();
        assert_eq!(raw, again, "local signing is deterministic");
    }
}
