//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, chain ids set)
//! - Reject contradictory gas defaults before they reach a signed transaction
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: OpsConfig → Result<(), Vec<ValidationError>>

use alloy::primitives::Address;
use thiserror::Error;

use crate::config::schema::{ChainConfig, GasOptions, OpsConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("environment must not be empty")]
    EmptyEnvironment,

    #[error("nonce_ledger_path must not be empty")]
    EmptyLedgerPath,

    #[error("chain '{chain}': chain_id must be positive")]
    ZeroChainId { chain: String },

    #[error("chain '{chain}': invalid rpc url '{url}'")]
    InvalidRpcUrl { chain: String, url: String },

    #[error("chain '{chain}': {field} must be positive")]
    ZeroTimeout { chain: String, field: &'static str },

    #[error("chain '{chain}': {reason}")]
    InvalidGasOptions { chain: String, reason: &'static str },

    #[error("chains '{first}' and '{second}' collide once lowercased")]
    DuplicateChain { first: String, second: String },

    #[error("authorization: invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("authorization: source must not be empty")]
    EmptySource,

    #[error("authorization: invalid verifying contract '{0}'")]
    InvalidVerifyingContract(String),
}

/// Validate the whole configuration, collecting every problem.
pub fn validate_config(config: &OpsConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.environment.trim().is_empty() {
        errors.push(ValidationError::EmptyEnvironment);
    }
    if config.nonce_ledger_path.trim().is_empty() {
        errors.push(ValidationError::EmptyLedgerPath);
    }

    let mut seen: Vec<(String, &String)> = Vec::new();
    for (name, chain) in &config.chains {
        let lowered = name.to_lowercase();
        if let Some((_, first)) = seen.iter().find(|(key, _)| *key == lowered) {
            errors.push(ValidationError::DuplicateChain {
                first: (*first).clone(),
                second: name.clone(),
            });
        }
        seen.push((lowered, name));
        validate_chain(name, chain, &mut errors);
    }

    let auth = &config.authorization;
    if url::Url::parse(&auth.endpoint).is_err() {
        errors.push(ValidationError::InvalidEndpoint(auth.endpoint.clone()));
    }
    if auth.source.is_empty() {
        errors.push(ValidationError::EmptySource);
    }
    if auth.verifying_contract.parse::<Address>().is_err() {
        errors.push(ValidationError::InvalidVerifyingContract(
            auth.verifying_contract.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_chain(name: &str, chain: &ChainConfig, errors: &mut Vec<ValidationError>) {
    if chain.chain_id == 0 {
        errors.push(ValidationError::ZeroChainId { chain: name.to_string() });
    }
    for url in std::iter::once(&chain.rpc_url).chain(chain.failover_urls.iter()) {
        if url::Url::parse(url).is_err() {
            errors.push(ValidationError::InvalidRpcUrl {
                chain: name.to_string(),
                url: url.clone(),
            });
        }
    }
    if chain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout {
            chain: name.to_string(),
            field: "rpc_timeout_secs",
        });
    }
    if chain.confirmation_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout {
            chain: name.to_string(),
            field: "confirmation_timeout_secs",
        });
    }
    if let Some(reason) = gas_options_conflict(&chain.gas_options) {
        errors.push(ValidationError::InvalidGasOptions {
            chain: name.to_string(),
            reason,
        });
    }
}

fn gas_options_conflict(gas: &GasOptions) -> Option<&'static str> {
    if gas.gas_price.is_some() && gas.max_fee_per_gas.is_some() {
        return Some("gas_price and max_fee_per_gas are mutually exclusive");
    }
    match (gas.max_fee_per_gas, gas.max_priority_fee_per_gas) {
        (None, Some(_)) => Some("max_priority_fee_per_gas requires max_fee_per_gas"),
        (Some(max), Some(tip)) if tip > max => {
            Some("max_priority_fee_per_gas exceeds max_fee_per_gas")
        }
        _ => None,
    }
}
