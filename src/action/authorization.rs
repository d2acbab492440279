//! Phantom-agent typed-data authorization.
//!
//! The venue never sees the action hash signed directly. The digest is wrapped in an
//! `Agent { source, connectionId }` struct and signed under the venue's EIP-712 domain; the
//! `source` string selects the deployment ("a" mainnet, "b" testnet).

use alloy::primitives::{Address, B256, U256};
use alloy::sol;
use alloy::sol_types::Eip712Domain;
use serde_json::Value;

use crate::action::encoder;
use crate::action::types::{ActionEnvelope, ActionError, ActionResult, AuthSignature};
use crate::config::AuthorizationConfig;
use crate::signer::{ChainSigner, TypedDataHash};

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct Agent {
        string source;
        bytes32 connectionId;
    }
}

/// Build the EIP-712 domain from configuration.
pub fn domain_from_config(config: &AuthorizationConfig) -> ActionResult<Eip712Domain> {
    let verifying_contract: Address = config.verifying_contract.trim().parse().map_err(|e| {
        ActionError::Domain(format!(
            "verifying contract '{}': {}",
            config.verifying_contract, e
        ))
    })?;

    Ok(Eip712Domain::new(
        Some(config.domain_name.clone().into()),
        Some(config.domain_version.clone().into()),
        Some(U256::from(config.domain_chain_id)),
        Some(verifying_contract),
        None,
    ))
}

/// The typed-data payload for a digest under the given source.
pub fn phantom_agent(digest: B256, source: &str) -> Agent {
    Agent {
        source: source.to_string(),
        connectionId: digest,
    }
}

/// Sign `Agent { source, connectionId: digest }` under `domain`.
pub async fn authorize<S>(
    signer: &S,
    digest: B256,
    source: &str,
    domain: &Eip712Domain,
) -> ActionResult<AuthSignature>
where
    S: ChainSigner + ?Sized,
{
    let agent = phantom_agent(digest, source);
    let payload = TypedDataHash::new(domain, &agent);
    let signature = signer.sign_typed_data(&payload).await?;

    tracing::debug!(
        connection_id = %digest,
        source,
        "Phantom agent signed"
    );

    Ok(AuthSignature::from(&signature))
}

/// Hash, sign and wrap an action into the envelope the venue expects.
pub async fn sign_action<S>(
    signer: &S,
    config: &AuthorizationConfig,
    action: Value,
    nonce: u64,
    secondary_pool: Option<Address>,
) -> ActionResult<ActionEnvelope>
where
    S: ChainSigner + ?Sized,
{
    let digest = encoder::digest(&action, secondary_pool, nonce)?;
    let domain = domain_from_config(config)?;
    let signature = authorize(signer, digest, &config.source, &domain).await?;

    Ok(ActionEnvelope {
        action,
        nonce,
        signature,
        vault_address: secondary_pool,
    })
}
