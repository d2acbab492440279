//! Transaction assembly and offline signing.
//!
//! # Merge order (lowest to highest priority)
//! 1. Chain gas defaults from `gas_options`
//! 2. Chain id and the resolved nonce (ledger when offline, node otherwise) plus any offset
//! 3. Explicit caller fields

use std::path::Path;

use alloy::primitives::{Address, Bytes, U256};

use crate::config::ChainConfig;
use crate::nonce::{LedgerStorage, NonceError, NonceLedger};
use crate::observability::metrics;
use crate::signer::ChainSigner;
use crate::transaction::client::NodeClient;
use crate::transaction::record::TransactionRecord;
use crate::transaction::types::{
    BaseTx, BuildOptions, TransactionError, TransactionResult, TxFields, EIP1559_TX_TYPE,
    LEGACY_TX_TYPE,
};

/// Builds complete unsigned transactions for one chain and one environment.
pub struct TxBuilder<'a, S: LedgerStorage> {
    environment: &'a str,
    chain_name: String,
    chain: &'a ChainConfig,
    ledger: &'a NonceLedger<S>,
    node: Option<&'a dyn NodeClient>,
}

/// Resolved fee fields and the type they imply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pricing {
    gas_price: Option<u128>,
    max_fee_per_gas: Option<u128>,
    max_priority_fee_per_gas: Option<u128>,
    tx_type: u8,
}

impl<'a, S: LedgerStorage> TxBuilder<'a, S> {
    pub fn new(
        environment: &'a str,
        chain_name: &str,
        chain: &'a ChainConfig,
        ledger: &'a NonceLedger<S>,
    ) -> Self {
        Self {
            environment,
            chain_name: chain_name.to_lowercase(),
            chain,
            ledger,
            node: None,
        }
    }

    /// Attach a node for online builds. Offline builds never touch it.
    pub fn with_node(mut self, node: &'a dyn NodeClient) -> Self {
        self.node = Some(node);
        self
    }

    /// Assemble the unsigned transaction `from` will sign.
    pub async fn build(
        &self,
        from: Address,
        fields: &TxFields,
        options: BuildOptions,
    ) -> TransactionResult<BaseTx> {
        let to = fields
            .to
            .filter(|to| !to.is_zero())
            .ok_or(TransactionError::MissingTo)?;
        let gas_limit = fields
            .gas_limit
            .or(self.chain.gas_options.gas_limit)
            .ok_or(TransactionError::MissingGasLimit)?;
        let pricing = self.resolve_pricing(fields, options).await?;
        let nonce = self.resolve_nonce(from, fields, options).await?;

        let tx = BaseTx {
            nonce,
            to,
            value: fields.value.unwrap_or(U256::ZERO),
            data: fields.data.clone().unwrap_or_else(Bytes::new),
            gas_limit,
            gas_price: pricing.gas_price,
            max_fee_per_gas: pricing.max_fee_per_gas,
            max_priority_fee_per_gas: pricing.max_priority_fee_per_gas,
            chain_id: self.chain.chain_id,
            tx_type: pricing.tx_type,
        };

        tracing::debug!(
            chain = %self.chain_name,
            from = %from,
            nonce = tx.nonce,
            tx_type = tx.tx_type,
            offline = options.offline,
            "Transaction built"
        );

        Ok(tx)
    }

    /// Build and sign, advance the ledger, then persist a `PENDING` record at `path`.
    ///
    /// Nothing is written unless building and signing both succeed. An existing record at `path`
    /// is never overwritten. The ledger moves first: if the record write then fails the nonce is
    /// skipped, which `nonce_offset` can repair, instead of being handed out a second time.
    pub async fn sign_to_record<Sg>(
        &self,
        signer: &Sg,
        fields: &TxFields,
        options: BuildOptions,
        path: &Path,
    ) -> TransactionResult<TransactionRecord>
    where
        Sg: ChainSigner + ?Sized,
    {
        if TransactionRecord::load(path)?.is_some() {
            return Err(TransactionError::RecordExists(path.display().to_string()));
        }

        let from = signer.get_address().await?;
        let tx = self.build(from, fields, options).await?;
        let raw = signer.sign_transaction(&tx).await?;
        let record = TransactionRecord::pending(tx, raw);

        self.advance_ledger(from, record.base_tx.nonce)?;
        record.save(path)?;

        metrics::record_transaction_signed(&self.chain_name, record.base_tx.tx_type);
        tracing::info!(
            chain = %self.chain_name,
            from = %from,
            nonce = record.base_tx.nonce,
            path = %path.display(),
            "Transaction signed and stored"
        );

        Ok(record)
    }

    /// Store `consumed + 1` as the next nonce for `from`.
    fn advance_ledger(&self, from: Address, consumed: u64) -> TransactionResult<()> {
        let next = consumed
            .checked_add(1)
            .ok_or_else(|| TransactionError::Malformed("nonce overflow".to_string()))?;

        match self.ledger.get(self.environment, &self.chain_name, from) {
            Ok(current) if next < current => {
                tracing::warn!(
                    chain = %self.chain_name,
                    from = %from,
                    current,
                    next,
                    "Nonce ledger moved backwards; later offline builds will reuse nonces up to the old value"
                );
            }
            Ok(_) | Err(NonceError::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        self.ledger
            .set(self.environment, &self.chain_name, from, next)?;
        Ok(())
    }

    async fn resolve_nonce(
        &self,
        from: Address,
        fields: &TxFields,
        options: BuildOptions,
    ) -> TransactionResult<u64> {
        if let Some(nonce) = fields.nonce {
            return Ok(nonce);
        }

        let base = if options.offline {
            self.ledger.get(self.environment, &self.chain_name, from)?
        } else {
            self.node()?.get_transaction_count(from).await?
        };

        match options.nonce_offset {
            None | Some(0) => Ok(base),
            Some(offset) => {
                let adjusted = base.checked_add_signed(offset).ok_or(
                    TransactionError::InvalidNonceOffset {
                        nonce: base,
                        offset,
                    },
                )?;
                tracing::info!(base, offset, nonce = adjusted, "Nonce offset applied");
                Ok(adjusted)
            }
        }
    }

    async fn resolve_pricing(
        &self,
        fields: &TxFields,
        options: BuildOptions,
    ) -> TransactionResult<Pricing> {
        // Explicit fields override defaults one at a time. Choosing a fee model explicitly
        // drops the other model's defaults, so a legacy override never inherits an EIP-1559
        // default (or the other way round).
        let defaults = &self.chain.gas_options;
        let explicit_legacy = fields.gas_price.is_some();
        let explicit_eip1559 =
            fields.max_fee_per_gas.is_some() || fields.max_priority_fee_per_gas.is_some();

        let mut gas_price = fields
            .gas_price
            .or(defaults.gas_price.filter(|_| !explicit_eip1559));
        let max_fee = fields
            .max_fee_per_gas
            .or(defaults.max_fee_per_gas.filter(|_| !explicit_legacy));
        let priority_fee = fields
            .max_priority_fee_per_gas
            .or(defaults.max_priority_fee_per_gas.filter(|_| !explicit_legacy));

        if gas_price.is_some() && max_fee.is_some() {
            return Err(TransactionError::InvalidFeePair(
                "gasPrice and maxFeePerGas are mutually exclusive".to_string(),
            ));
        }

        if let Some(max_fee) = max_fee {
            if let Some(priority) = priority_fee {
                if priority > max_fee {
                    return Err(TransactionError::InvalidFeePair(format!(
                        "maxPriorityFeePerGas {priority} exceeds maxFeePerGas {max_fee}"
                    )));
                }
            }
            return Ok(Pricing {
                gas_price: None,
                max_fee_per_gas: Some(max_fee),
                max_priority_fee_per_gas: priority_fee,
                tx_type: EIP1559_TX_TYPE,
            });
        }

        if priority_fee.is_some() {
            return Err(TransactionError::InvalidFeePair(
                "maxPriorityFeePerGas requires maxFeePerGas".to_string(),
            ));
        }

        if gas_price.is_none() && !options.offline {
            gas_price = Some(self.node()?.get_gas_price().await?);
        }

        let gas_price = gas_price.ok_or(TransactionError::MissingGasPrice)?;
        Ok(Pricing {
            gas_price: Some(gas_price),
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            tx_type: LEGACY_TX_TYPE,
        })
    }

    fn node(&self) -> TransactionResult<&'a dyn NodeClient> {
        self.node.ok_or_else(|| {
            TransactionError::Rpc("online build requested without a node client".to_string())
        })
    }
}
