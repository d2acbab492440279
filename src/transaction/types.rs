//! Transaction types, record lifecycle and error definitions.

use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{Address, Bytes, Signature, TxHash, TxKind, B256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::nonce::NonceError;
use crate::signer::SignerError;

/// Legacy transaction type byte.
pub const LEGACY_TX_TYPE: u8 = 0;
/// EIP-1559 transaction type byte.
pub const EIP1559_TX_TYPE: u8 = 2;

/// Errors that can occur while building, signing, persisting or broadcasting transactions.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// No destination address was supplied.
    #[error("Missing required field 'to': a non-zero destination address is required")]
    MissingTo,

    /// No gas limit in the explicit fields or the chain defaults.
    #[error("Missing required field 'gasLimit': set it explicitly or in the chain's gas_options")]
    MissingGasLimit,

    /// Neither a legacy gas price nor an EIP-1559 fee cap.
    #[error("Missing gas pricing: provide 'gasPrice' or 'maxFeePerGas'")]
    MissingGasPrice,

    /// Inconsistent EIP-1559 fee fields.
    #[error("Invalid EIP-1559 fees: {0}")]
    InvalidFeePair(String),

    /// Nonce offset pushed the nonce below zero or past u64.
    #[error("Nonce offset {offset} cannot be applied to nonce {nonce}")]
    InvalidNonceOffset { nonce: u64, offset: i64 },

    /// A stored base transaction is internally inconsistent.
    #[error("Malformed transaction: {0}")]
    Malformed(String),

    /// Nonce ledger failure (including the fatal not-found case).
    #[error(transparent)]
    Nonce(#[from] NonceError),

    /// Signing backend failure.
    #[error(transparent)]
    Signer(#[from] SignerError),

    /// RPC read call failed on every provider.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Node rejected or failed to relay the signed transaction.
    #[error("Submission failed: {0}")]
    Submission(String),

    /// Transaction was mined but reverted.
    #[error("Transaction {0} reverted")]
    Reverted(TxHash),

    /// Transaction was not confirmed in time.
    #[error("Transaction {hash} not confirmed with {confirmations} confirmations in time")]
    ConfirmationTimeout { hash: TxHash, confirmations: u32 },

    /// The node serves a different chain than the record was signed for.
    #[error("Chain mismatch: record is for chain {expected}, node reports {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// Nothing stored at the record path.
    #[error("No transaction record found at {0}")]
    RecordNotFound(String),

    /// Signing would overwrite an existing record.
    #[error("A transaction record already exists at {0}; refusing to overwrite it")]
    RecordExists(String),

    /// Attempted to move a record out of a terminal state.
    #[error("Invalid record transition from {from} to {to}")]
    InvalidTransition {
        from: RecordStatus,
        to: RecordStatus,
    },

    /// Record file I/O failure.
    #[error("Record I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record file is not valid JSON for a transaction record.
    #[error("Record format error: {0}")]
    Format(#[from] serde_json::Error),
}

impl TransactionError {
    /// Caller errors: malformed or missing fields. Never worth retrying.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingTo
                | Self::MissingGasLimit
                | Self::MissingGasPrice
                | Self::InvalidFeePair(_)
                | Self::InvalidNonceOffset { .. }
                | Self::Malformed(_)
        )
    }
}

/// Result type for transaction operations.
pub type TransactionResult<T> = Result<T, TransactionError>;

/// Fields supplied explicitly by the caller. Anything set here wins over chain defaults and the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxFields {
    pub to: Option<Address>,
    pub value: Option<U256>,
    pub data: Option<Bytes>,
    pub nonce: Option<u64>,
    pub gas_limit: Option<u64>,
    pub gas_price: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
}

/// Build mode switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Never query a node; nonce comes from the ledger, gas from chain defaults.
    pub offline: bool,
    /// Added to the resolved nonce to correct drift against the chain.
    pub nonce_offset: Option<i64>,
}

/// The complete unsigned transaction that gets signed and stored as `baseTx`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseTx {
    pub nonce: u64,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<u128>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<u128>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<u128>,
    pub chain_id: u64,
    #[serde(rename = "type")]
    pub tx_type: u8,
}

impl BaseTx {
    /// Whether this is a typed (EIP-1559) transaction.
    pub fn is_typed(&self) -> bool {
        self.tx_type == EIP1559_TX_TYPE
    }

    /// Convert into the alloy transaction that is actually hashed and signed.
    pub fn to_unsigned(&self) -> TransactionResult<UnsignedTransaction> {
        match self.tx_type {
            LEGACY_TX_TYPE => {
                let gas_price = self.gas_price.ok_or(TransactionError::MissingGasPrice)?;
                Ok(UnsignedTransaction::Legacy(TxLegacy {
                    chain_id: Some(self.chain_id),
                    nonce: self.nonce,
                    gas_price,
                    gas_limit: self.gas_limit,
                    to: TxKind::Call(self.to),
                    value: self.value,
                    input: self.data.clone(),
                }))
            }
            EIP1559_TX_TYPE => {
                let max_fee_per_gas = self.max_fee_per_gas.ok_or(TransactionError::MissingGasPrice)?;
                Ok(UnsignedTransaction::Eip1559(TxEip1559 {
                    chain_id: self.chain_id,
                    nonce: self.nonce,
                    gas_limit: self.gas_limit,
                    max_fee_per_gas,
                    max_priority_fee_per_gas: self.max_priority_fee_per_gas.unwrap_or(0),
                    to: TxKind::Call(self.to),
                    value: self.value,
                    input: self.data.clone(),
                    ..Default::default()
                }))
            }
            other => Err(TransactionError::Malformed(format!(
                "unsupported transaction type {other}"
            ))),
        }
    }
}

/// An unsigned alloy transaction of one of the two supported types.
#[derive(Debug, Clone)]
pub enum UnsignedTransaction {
    Legacy(TxLegacy),
    Eip1559(TxEip1559),
}

impl UnsignedTransaction {
    /// Hash the signer must sign.
    pub fn signature_hash(&self) -> B256 {
        match self {
            Self::Legacy(tx) => tx.signature_hash(),
            Self::Eip1559(tx) => tx.signature_hash(),
        }
    }

    /// The exact byte payload a hardware device hashes and signs.
    pub fn encoded_for_signing(&self) -> Vec<u8> {
        match self {
            Self::Legacy(tx) => tx.encoded_for_signing(),
            Self::Eip1559(tx) => tx.encoded_for_signing(),
        }
    }

    /// Attach a signature and produce the raw EIP-2718 bytes ready for `eth_sendRawTransaction`.
    pub fn into_raw(self, signature: Signature) -> Bytes {
        let envelope = match self {
            Self::Legacy(tx) => TxEnvelope::Legacy(tx.into_signed(signature)),
            Self::Eip1559(tx) => TxEnvelope::Eip1559(tx.into_signed(signature)),
        };
        envelope.encoded_2718().into()
    }
}

/// Lifecycle status of a stored transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    Pending,
    Success,
    Failed,
}

impl RecordStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, b256};

    fn legacy_tx() -> BaseTx {
        BaseTx {
            nonce: 9,
            to: address!("3535353535353535353535353535353535353535"),
            value: U256::from(1_000_000_000_000_000_000u128),
            data: Bytes::new(),
            gas_limit: 21_000,
            gas_price: Some(20_000_000_000),
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            chain_id: 1,
            tx_type: LEGACY_TX_TYPE,
        }
    }

    #[test]
    fn test_legacy_signature_hash_matches_eip155_example() {
        let unsigned = legacy_tx().to_unsigned().unwrap();
        assert_eq!(
            unsigned.signature_hash(),
            b256!("daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53")
        );
    }

    #[test]
    fn test_typed_tx_requires_fee_cap() {
        let mut tx = legacy_tx();
        tx.tx_type = EIP1559_TX_TYPE;
        tx.gas_price = None;
        assert!(matches!(tx.to_unsigned(), Err(TransactionError::MissingGasPrice)));

        tx.max_fee_per_gas = Some(30_000_000_000);
        assert!(matches!(tx.to_unsigned(), Ok(UnsignedTransaction::Eip1559(_))));
    }

    #[test]
    fn test_unknown_type_is_malformed() {
        let mut tx = legacy_tx();
        tx.tx_type = 3;
        let err = tx.to_unsigned().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_base_tx_json_shape() {
        let json = serde_json::to_value(legacy_tx()).unwrap();
        assert_eq!(json["type"], 0);
        assert_eq!(json["gasLimit"], 21_000);
        assert_eq!(json["chainId"], 1);
        assert_eq!(json["data"], "0x");
        assert!(json.get("maxFeePerGas").is_none());
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(serde_json::to_string(&RecordStatus::Pending).unwrap(), "\"PENDING\"");
        let status: RecordStatus = serde_json::from_str("\"FAILED\"").unwrap();
        assert!(status.is_terminal());
        assert!(!RecordStatus::Pending.is_terminal());
    }

    #[test]
    fn test_error_display() {
        let err = TransactionError::MissingGasLimit;
        assert!(err.to_string().contains("gasLimit"));
        assert!(err.is_validation());

        let err = TransactionError::Submission("nonce too low".into());
        assert!(!err.is_validation());
    }
}
