//! Action envelope types and error definitions.

use alloy::primitives::{Address, Signature, B256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::signer::SignerError;

/// Errors that can occur while encoding, authorizing or submitting an action.
#[derive(Debug, Error)]
pub enum ActionError {
    /// Nonce is negative, fractional or does not fit in u64.
    #[error("Invalid nonce: {0}")]
    InvalidNonce(String),

    /// Action could not be MessagePack-encoded or is not a JSON object.
    #[error("Action encoding failed: {0}")]
    Encoding(String),

    /// The venue answered but did not accept the action. Carries the venue's diagnostic verbatim.
    #[error("Remote authorization rejected: {0}")]
    RemoteAuthorization(String),

    /// The venue could not be reached.
    #[error("Remote authorization transport error: {0}")]
    Transport(String),

    /// Invalid EIP-712 domain settings.
    #[error("Invalid authorization domain: {0}")]
    Domain(String),

    /// Signing backend failure.
    #[error(transparent)]
    Signer(#[from] SignerError),
}

/// Result type for action operations.
pub type ActionResult<T> = Result<T, ActionError>;

/// Signature in the venue's JSON shape: 32-byte hex `r`/`s` and `v` as 27 or 28.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSignature {
    pub r: B256,
    pub s: B256,
    pub v: u8,
}

impl From<&Signature> for AuthSignature {
    fn from(signature: &Signature) -> Self {
        Self {
            r: B256::from(signature.r().to_be_bytes::<32>()),
            s: B256::from(signature.s().to_be_bytes::<32>()),
            v: 27 + u8::from(signature.v()),
        }
    }
}

/// The signed request body posted to the venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEnvelope {
    pub action: serde_json::Value,
    pub nonce: u64,
    pub signature: AuthSignature,
    /// Secondary settlement pool; omitted from the body when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_address: Option<Address>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, b256, U256};
    use serde_json::json;

    #[test]
    fn test_auth_signature_from_alloy() {
        let sig = Signature::new(U256::from(1), U256::from(2), true);
        let auth = AuthSignature::from(&sig);
        assert_eq!(
            auth.r,
            b256!("0000000000000000000000000000000000000000000000000000000000000001")
        );
        assert_eq!(auth.v, 28);

        let auth = AuthSignature::from(&Signature::new(U256::from(1), U256::from(2), false));
        assert_eq!(auth.v, 27);
    }

    #[test]
    fn test_envelope_json_shape() {
        let envelope = ActionEnvelope {
            action: json!({"type": "noop"}),
            nonce: 1_700_000_000_000,
            signature: AuthSignature {
                r: B256::repeat_byte(0x11),
                s: B256::repeat_byte(0x22),
                v: 27,
            },
            vault_address: None,
        };

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["nonce"], 1_700_000_000_000u64);
        assert_eq!(value["signature"]["v"], 27);
        assert_eq!(value["signature"]["r"], format!("0x{}", "11".repeat(32)));
        assert!(value.get("vaultAddress").is_none());

        let with_pool = ActionEnvelope {
            vault_address: Some(address!("1719fb3a8f7b3d2b6b6a1f0e9c3a2d5e7b1c4f20")),
            ..envelope
        };
        let value = serde_json::to_value(&with_pool).unwrap();
        assert!(value["vaultAddress"].is_string());
    }
}
