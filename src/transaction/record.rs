//! Signed transaction records persisted between signing and broadcast.

use std::path::Path;

use alloy::primitives::{Bytes, TxHash};
use serde::{Deserialize, Serialize};

use crate::persist;
use crate::transaction::types::{BaseTx, RecordStatus, TransactionError, TransactionResult};

/// The on-disk artifact of an offline signing run. The file path is its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub base_tx: BaseTx,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_tx: Option<Bytes>,
    pub status: RecordStatus,
    /// Set only on `SUCCESS`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<TxHash>,
    /// Set only on `FAILED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set on `FAILED` when the node accepted the transaction but it never confirmed. It may
    /// still be mined later.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_hash: Option<TxHash>,
}

impl TransactionRecord {
    /// A freshly signed record awaiting broadcast.
    pub fn pending(base_tx: BaseTx, signed_tx: Bytes) -> Self {
        Self {
            base_tx,
            signed_tx: Some(signed_tx),
            status: RecordStatus::Pending,
            hash: None,
            error: None,
            submitted_hash: None,
        }
    }

    /// Load the record at `path`. A missing or empty file is `None`.
    pub fn load(path: &Path) -> TransactionResult<Option<Self>> {
        persist::read_json(path)
    }

    /// Overwrite the record at `path` atomically.
    pub fn save(&self, path: &Path) -> TransactionResult<()> {
        persist::write_json_atomic::<_, TransactionError>(path, self)?;
        tracing::debug!(path = %path.display(), status = %self.status, "Transaction record saved");
        Ok(())
    }

    pub fn mark_success(&mut self, hash: TxHash) -> TransactionResult<()> {
        self.transition(RecordStatus::Success)?;
        self.hash = Some(hash);
        self.error = None;
        self.submitted_hash = None;
        Ok(())
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) -> TransactionResult<()> {
        self.transition(RecordStatus::Failed)?;
        self.hash = None;
        self.error = Some(reason.into());
        self.submitted_hash = None;
        Ok(())
    }

    /// `FAILED` after the node accepted `hash` but confirmation did not follow.
    pub fn mark_unconfirmed(
        &mut self,
        hash: TxHash,
        reason: impl Into<String>,
    ) -> TransactionResult<()> {
        self.mark_failed(reason)?;
        self.submitted_hash = Some(hash);
        Ok(())
    }

    fn transition(&mut self, to: RecordStatus) -> TransactionResult<()> {
        if self.status.is_terminal() {
            return Err(TransactionError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::types::EIP1559_TX_TYPE;
    use alloy::primitives::{address, U256};

    fn sample() -> TransactionRecord {
        TransactionRecord::pending(
            BaseTx {
                nonce: 5,
                to: address!("3535353535353535353535353535353535353535"),
                value: U256::ZERO,
                data: Bytes::from_static(&[0xab, 0xcd]),
                gas_limit: 100_000,
                gas_price: None,
                max_fee_per_gas: Some(30_000_000_000),
                max_priority_fee_per_gas: Some(1_000_000_000),
                chain_id: 1,
                tx_type: EIP1559_TX_TYPE,
            },
            Bytes::from_static(&[0x02, 0xf8, 0x70]),
        )
    }

    #[test]
    fn test_file_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["signedTx"], "0x02f870");
        assert_eq!(json["baseTx"]["nonce"], 5);
        assert_eq!(json["baseTx"]["type"], 2);
        assert!(json.get("hash").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_save_then_load_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tx.json");

        let record = sample();
        record.save(&path).unwrap();
        let loaded = TransactionRecord::load(&path).unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_missing_or_empty_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tx.json");
        assert!(TransactionRecord::load(&path).unwrap().is_none());

        std::fs::write(&path, "").unwrap();
        assert!(TransactionRecord::load(&path).unwrap().is_none());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut record = sample();
        record.mark_failed("nonce too low").unwrap();
        assert_eq!(record.status, RecordStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("nonce too low"));

        let err = record.mark_success(TxHash::ZERO).unwrap_err();
        assert!(matches!(
            err,
            TransactionError::InvalidTransition {
                from: RecordStatus::Failed,
                to: RecordStatus::Success
            }
        ));
        assert!(record.hash.is_none());
    }

    #[test]
    fn test_success_sets_hash() {
        let mut record = sample();
        let hash = TxHash::repeat_byte(0x42);
        record.mark_success(hash).unwrap();
        assert_eq!(record.hash, Some(hash));
        assert!(record.mark_failed("late").is_err());
    }

    #[test]
    fn test_unconfirmed_keeps_submitted_hash() {
        let mut record = sample();
        let hash = TxHash::repeat_byte(0x07);
        record.mark_unconfirmed(hash, "not confirmed in time").unwrap();
        assert_eq!(record.status, RecordStatus::Failed);
        assert!(record.hash.is_none());
        assert_eq!(record.submitted_hash, Some(hash));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["submittedHash"], hash.to_string());
        assert!(json.get("hash").is_none());
    }
}
