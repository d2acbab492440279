//! Single-shot broadcast of stored records.
//!
//! A record is submitted only while it is `PENDING`. Terminal records are reported and left
//! untouched without any network call, so re-running a broadcast is always safe.

use std::path::{Path, PathBuf};

use alloy::consensus::transaction::SignerRecoverable;
use alloy::consensus::TxEnvelope;
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{Address, TxHash};

use crate::observability::metrics;
use crate::transaction::client::NodeClient;
use crate::transaction::outcome;
use crate::transaction::record::TransactionRecord;
use crate::transaction::types::{BaseTx, RecordStatus, TransactionError, TransactionResult};

/// What a broadcast run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// The record was already terminal; nothing was sent.
    Skipped(RecordStatus),
    /// Mined with the required confirmations; the record is `SUCCESS`.
    Confirmed { hash: TxHash, block_number: u64 },
    /// Submission or confirmation failed; the record is `FAILED`.
    Failed { reason: String },
    /// The node reported the work as already done; the record is `FAILED` with the matched
    /// reason but the run counts as clean.
    AlreadyApplied { reason: String },
}

impl BroadcastOutcome {
    /// Whether the invoking process should exit successfully.
    pub fn is_clean(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    fn metric_label(&self) -> &'static str {
        match self {
            Self::Skipped(_) => "skipped",
            Self::Confirmed { .. } => "success",
            Self::Failed { .. } => "failed",
            Self::AlreadyApplied { .. } => "already_applied",
        }
    }
}

/// Explorer URL for a transaction hash.
pub fn explorer_link(explorer_url: &str, hash: TxHash) -> String {
    if explorer_url.ends_with('/') {
        format!("{explorer_url}{hash}")
    } else {
        format!("{explorer_url}/{hash}")
    }
}

/// Decode `signed_tx`, check it signs exactly `base_tx`, and return the recovered sender.
pub fn verify_signed(base_tx: &BaseTx, signed_tx: &[u8]) -> TransactionResult<Address> {
    let mut buf = signed_tx;
    let envelope = TxEnvelope::decode_2718(&mut buf)
        .map_err(|e| TransactionError::Malformed(format!("signedTx does not decode: {e}")))?;
    if !buf.is_empty() {
        return Err(TransactionError::Malformed(format!(
            "signedTx has {} trailing bytes",
            buf.len()
        )));
    }

    let expected = base_tx.to_unsigned()?.signature_hash();
    if envelope.signature_hash() != expected {
        return Err(TransactionError::Malformed(
            "signedTx does not sign the stored baseTx".to_string(),
        ));
    }

    envelope
        .recover_signer()
        .map_err(|e| TransactionError::Malformed(format!("signedTx signature does not recover: {e}")))
}

/// Result of one record in a batch run.
#[derive(Debug)]
pub struct BatchEntry {
    pub path: PathBuf,
    pub result: TransactionResult<BroadcastOutcome>,
}

impl BatchEntry {
    fn is_clean(&self) -> bool {
        matches!(&self.result, Ok(outcome) if outcome.is_clean())
    }
}

/// Drives stored records through submission and confirmation.
pub struct BroadcastProcessor<'a> {
    chain_name: String,
    node: &'a dyn NodeClient,
}

impl<'a> BroadcastProcessor<'a> {
    pub fn new(chain_name: &str, node: &'a dyn NodeClient) -> Self {
        Self {
            chain_name: chain_name.to_lowercase(),
            node,
        }
    }

    /// Broadcast the record at `path` if it is pending.
    ///
    /// Errors are returned only when nothing was submitted (missing record, unreadable file,
    /// signed bytes that do not match `baseTx`, chain mismatch); every failure after submission
    /// is recorded in the file instead.
    pub async fn process(&self, path: &Path) -> TransactionResult<BroadcastOutcome> {
        let mut record = TransactionRecord::load(path)?
            .ok_or_else(|| TransactionError::RecordNotFound(path.display().to_string()))?;

        if record.status.is_terminal() {
            tracing::info!(
                path = %path.display(),
                status = %record.status,
                "Record already processed, nothing to broadcast"
            );
            let outcome = BroadcastOutcome::Skipped(record.status);
            metrics::record_broadcast(&self.chain_name, outcome.metric_label());
            return Ok(outcome);
        }

        let raw = record.signed_tx.clone().ok_or_else(|| {
            TransactionError::Malformed(format!(
                "pending record at {} has no signed transaction",
                path.display()
            ))
        })?;
        let sender = verify_signed(&record.base_tx, &raw)?;

        let node_chain_id = self.node.get_chain_id().await?;
        if node_chain_id != record.base_tx.chain_id {
            return Err(TransactionError::ChainMismatch {
                expected: record.base_tx.chain_id,
                actual: node_chain_id,
            });
        }

        tracing::info!(
            chain = %self.chain_name,
            path = %path.display(),
            from = %sender,
            nonce = record.base_tx.nonce,
            "Broadcasting signed transaction"
        );

        let outcome = match self.node.send_raw_transaction(&raw).await {
            Err(e) => {
                let reason = e.to_string();
                record.mark_failed(reason.clone())?;
                self.failure(reason)
            }
            Ok(hash) => match self.node.wait_for_confirmation(hash).await {
                Ok(confirmation) => {
                    record.mark_success(hash)?;
                    tracing::info!(
                        tx_hash = %hash,
                        block_number = confirmation.block_number,
                        "Transaction confirmed"
                    );
                    BroadcastOutcome::Confirmed {
                        hash,
                        block_number: confirmation.block_number,
                    }
                }
                Err(e) => {
                    let reason = e.to_string();
                    record.mark_unconfirmed(hash, reason.clone())?;
                    self.failure(reason)
                }
            },
        };

        record.save(path)?;
        metrics::record_broadcast(&self.chain_name, outcome.metric_label());
        Ok(outcome)
    }

    /// Broadcast records in order, stopping after the first one that errors or fails.
    ///
    /// Later records stay `PENDING` so the batch can be resumed once the failure is understood.
    pub async fn process_batch<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<BatchEntry> {
        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let entry = BatchEntry {
                path: path.to_path_buf(),
                result: self.process(path).await,
            };
            let clean = entry.is_clean();
            entries.push(entry);
            if !clean {
                let remaining = paths.len() - entries.len();
                if remaining > 0 {
                    tracing::warn!(
                        path = %path.display(),
                        remaining,
                        "Stopping batch broadcast after failure"
                    );
                }
                break;
            }
        }
        entries
    }

    fn failure(&self, reason: String) -> BroadcastOutcome {
        if let Some(pattern) = outcome::already_applied(&reason) {
            tracing::info!(matched = pattern, error = %reason, "Already applied, nothing left to do");
            BroadcastOutcome::AlreadyApplied { reason }
        } else {
            tracing::warn!(error = %reason, "Broadcast failed");
            BroadcastOutcome::Failed { reason }
        }
    }
}
