//! Node RPC client with failover and per-call timeouts.
//!
//! # Responsibilities
//! - Read chain state needed by online builds (transaction count, gas price, chain id)
//! - Relay signed transactions with `eth_sendRawTransaction`
//! - Poll receipts until the configured confirmation depth is reached

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionReceipt;
use alloy::transports::{RpcError, TransportError};
use async_trait::async_trait;
use tokio::time::{interval, timeout};

use crate::config::ChainConfig;
use crate::transaction::types::{TransactionError, TransactionResult};

/// Where a confirmed transaction landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub block_number: u64,
    pub confirmations: u64,
}

/// The node operations the pipeline depends on.
#[async_trait]
pub trait NodeClient: Send + Sync {
    async fn get_chain_id(&self) -> TransactionResult<u64>;

    /// Pending-inclusive transaction count, i.e. the next nonce.
    async fn get_transaction_count(&self, address: Address) -> TransactionResult<u64>;

    async fn get_gas_price(&self) -> TransactionResult<u128>;

    /// Relay a signed transaction. Errors here are submission failures.
    async fn send_raw_transaction(&self, raw: &Bytes) -> TransactionResult<TxHash>;

    /// Wait until the transaction has the configured confirmations. A reverted receipt is an error.
    async fn wait_for_confirmation(&self, hash: TxHash) -> TransactionResult<Confirmation>;
}

type DynProvider = Arc<dyn Provider + Send + Sync>;

/// alloy HTTP providers, primary first, tried in order.
#[derive(Clone)]
pub struct RpcClient {
    providers: Vec<DynProvider>,
    rpc_url: String,
    timeout_duration: Duration,
    confirmation_blocks: u32,
    confirmation_timeout: Duration,
    poll_interval: Duration,
}

impl RpcClient {
    /// Build providers for a chain. No network I/O happens here.
    pub fn new(config: &ChainConfig) -> TransactionResult<Self> {
        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            TransactionError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        providers.push(Arc::new(ProviderBuilder::new().connect_http(primary_url)) as DynProvider);

        for url_str in &config.failover_urls {
            match url_str.parse() {
                Ok(url) => {
                    providers.push(Arc::new(ProviderBuilder::new().connect_http(url)) as DynProvider)
                }
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        Ok(Self {
            providers,
            rpc_url: config.rpc_url.clone(),
            timeout_duration: Duration::from_secs(config.rpc_timeout_secs),
            confirmation_blocks: config.confirmation_blocks,
            confirmation_timeout: Duration::from_secs(config.confirmation_timeout_secs),
            poll_interval: Duration::from_secs(2),
        })
    }

    /// Override the receipt polling interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Run a read call against each provider in turn until one answers.
    async fn with_failover<T, F, Fut>(&self, operation: &str, call: F) -> TransactionResult<T>
    where
        F: Fn(DynProvider) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, call(provider.clone())).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, operation, error = %e, "RPC error, trying next provider")
                }
                Err(_) => tracing::warn!(provider_idx = i, operation, "RPC timeout, trying next provider"),
            }
        }
        Err(TransactionError::Rpc(format!(
            "All RPC providers failed to {operation}"
        )))
    }

    async fn get_block_number(&self) -> TransactionResult<u64> {
        self.with_failover("get block number", |p| async move {
            p.get_block_number().await
        })
        .await
    }

    async fn get_transaction_receipt(
        &self,
        hash: TxHash,
    ) -> TransactionResult<Option<TransactionReceipt>> {
        self.with_failover("get receipt", |p| async move {
            p.get_transaction_receipt(hash).await
        })
        .await
    }
}

#[async_trait]
impl NodeClient for RpcClient {
    async fn get_chain_id(&self) -> TransactionResult<u64> {
        self.with_failover("get chain id", |p| async move { p.get_chain_id().await })
            .await
    }

    async fn get_transaction_count(&self, address: Address) -> TransactionResult<u64> {
        self.with_failover("get transaction count", |p| async move {
            p.get_transaction_count(address).pending().await
        })
        .await
    }

    async fn get_gas_price(&self) -> TransactionResult<u128> {
        self.with_failover("get gas price", |p| async move { p.get_gas_price().await })
            .await
    }

    async fn send_raw_transaction(&self, raw: &Bytes) -> TransactionResult<TxHash> {
        let mut last_error = String::from("no providers configured");

        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.send_raw_transaction(raw)).await {
                Ok(Ok(pending)) => {
                    let hash = *pending.tx_hash();
                    tracing::info!(provider_idx = i, tx_hash = %hash, "Transaction submitted");
                    return Ok(hash);
                }
                // Only transport failures move on; a node answering with an error has spoken.
                Ok(Err(RpcError::Transport(e))) => {
                    tracing::warn!(provider_idx = i, error = %e, "Submission transport error, trying next provider");
                    last_error = e.to_string();
                }
                Ok(Err(e)) => return Err(TransactionError::Submission(e.to_string())),
                Err(_) => {
                    tracing::warn!(provider_idx = i, "Submission timeout, trying next provider");
                    last_error = format!("timed out after {:?}", self.timeout_duration);
                }
            }
        }

        Err(TransactionError::Submission(format!(
            "all RPC providers failed: {last_error}"
        )))
    }

    async fn wait_for_confirmation(&self, hash: TxHash) -> TransactionResult<Confirmation> {
        let required = u64::from(self.confirmation_blocks.max(1));

        let result = timeout(self.confirmation_timeout, async {
            let mut ticker = interval(self.poll_interval);

            loop {
                ticker.tick().await;

                let receipt = match self.get_transaction_receipt(hash).await? {
                    Some(receipt) => receipt,
                    None => {
                        tracing::debug!(tx_hash = %hash, "Transaction pending");
                        continue;
                    }
                };

                if !receipt.status() {
                    return Err(TransactionError::Reverted(hash));
                }

                let current_block = self.get_block_number().await?;
                let tx_block = receipt.block_number.unwrap_or(current_block);
                let confirmations = current_block.saturating_sub(tx_block) + 1;

                if confirmations >= required {
                    return Ok(Confirmation {
                        block_number: tx_block,
                        confirmations,
                    });
                }

                tracing::debug!(
                    tx_hash = %hash,
                    confirmations,
                    required,
                    "Waiting for confirmations"
                );
            }
        })
        .await;

        match result {
            Ok(confirmation) => confirmation,
            Err(_) => Err(TransactionError::ConfirmationTimeout {
                hash,
                confirmations: self.confirmation_blocks,
            }),
        }
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("rpc_url", &self.rpc_url)
            .field("providers", &self.providers.len())
            .field("timeout", &self.timeout_duration)
            .field("confirmation_blocks", &self.confirmation_blocks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ChainConfig {
        ChainConfig {
            chain_id: 31337,
            // Nothing listens on the discard port.
            rpc_url: "http://127.0.0.1:9".to_string(),
            rpc_timeout_secs: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_invalid_primary_url() {
        let config = ChainConfig {
            rpc_url: "not a url".to_string(),
            ..test_config()
        };
        assert!(matches!(RpcClient::new(&config), Err(TransactionError::Rpc(_))));
    }

    #[test]
    fn test_invalid_failover_is_skipped() {
        let mut config = test_config();
        config.failover_urls.push("http://127.0.0.1:10".to_string());
        config.failover_urls.push("::bad::".to_string());
        assert_eq!(RpcClient::new(&config).unwrap().provider_count(), 2);
    }

    #[tokio::test]
    async fn test_rpc_failover_exhausted() {
        let mut config = test_config();
        config.failover_urls.push("http://127.0.0.1:10".to_string());
        let client = RpcClient::new(&config).unwrap();

        let result = client.get_chain_id().await;
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("All RPC providers failed"));
    }

    #[tokio::test]
    async fn test_submission_transport_failure() {
        let client = RpcClient::new(&test_config()).unwrap();
        let err = client
            .send_raw_transaction(&Bytes::from_static(&[0x02]))
            .await
            .unwrap_err();
        assert!(matches!(err, TransactionError::Submission(_)));
    }
}
