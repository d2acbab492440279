//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for chain-ops.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OpsConfig {
    /// Environment name, the top-level key of the nonce ledger (e.g. "testnet").
    pub environment: String,

    /// Path of the persisted nonce ledger.
    pub nonce_ledger_path: String,

    /// Chain definitions keyed by chain name.
    pub chains: BTreeMap<String, ChainConfig>,

    /// Remote action authorization settings.
    pub authorization: AuthorizationConfig,

    /// Hardware signer bridge settings.
    pub hardware: HardwareConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            environment: "testnet".to_string(),
            nonce_ledger_path: "nonces.json".to_string(),
            chains: BTreeMap::new(),
            authorization: AuthorizationConfig::default(),
            hardware: HardwareConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl OpsConfig {
    /// Look up a chain by name. Names are matched lowercased.
    pub fn chain(&self, name: &str) -> Option<&ChainConfig> {
        let wanted = name.to_lowercase();
        self.chains
            .iter()
            .find(|(key, _)| key.to_lowercase() == wanted)
            .map(|(_, chain)| chain)
    }
}

/// Per-chain configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Chain ID (e.g., 1 for Ethereum mainnet, 31337 for local Anvil).
    pub chain_id: u64,

    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Number of block confirmations required before a broadcast counts as successful.
    pub confirmation_blocks: u32,

    /// Maximum time to wait for those confirmations.
    pub confirmation_timeout_secs: u64,

    /// Block explorer transaction URL prefix, printed after a confirmed broadcast.
    pub explorer_url: Option<String>,

    /// Static gas defaults used by offline builds.
    pub gas_options: GasOptions,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            rpc_timeout_secs: 10,
            confirmation_blocks: 1,
            confirmation_timeout_secs: 300,
            explorer_url: None,
            gas_options: GasOptions::default(),
        }
    }
}

/// Chain-level gas defaults. Explicit transaction fields always override these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GasOptions {
    pub gas_limit: Option<u64>,
    /// Legacy (type 0) gas price in wei.
    pub gas_price: Option<u128>,
    /// EIP-1559 fee cap in wei.
    pub max_fee_per_gas: Option<u128>,
    /// EIP-1559 tip in wei.
    pub max_priority_fee_per_gas: Option<u128>,
}

/// Remote action authorization configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    /// Exchange endpoint receiving signed action envelopes.
    pub endpoint: String,

    /// Phantom agent `source` (domain selector), e.g. "a" for mainnet, "b" for testnet.
    pub source: String,

    /// EIP-712 domain name.
    pub domain_name: String,

    /// EIP-712 domain version.
    pub domain_version: String,

    /// EIP-712 domain chain id.
    pub domain_chain_id: u64,

    /// EIP-712 verifying contract, hex encoded.
    pub verifying_contract: String,

    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.hyperliquid-testnet.xyz/exchange".to_string(),
            source: "b".to_string(),
            domain_name: "Exchange".to_string(),
            domain_version: "1".to_string(),
            domain_chain_id: 1337,
            verifying_contract: "0x0000000000000000000000000000000000000000".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Hardware signer bridge configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// URL of the local device bridge daemon.
    pub bridge_url: String,

    /// BIP-32 derivation path of the signing account.
    pub derivation_path: String,

    /// Per-request timeout in seconds. Device confirmations need a human, so this is generous.
    pub timeout_secs: u64,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            bridge_url: "http://127.0.0.1:9070".to_string(),
            derivation_path: "m/44'/60'/0'/0/0".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}
