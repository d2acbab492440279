//! Canonical action hashing.
//!
//! The digest is `keccak256(msgpack(action) ‖ nonce_be64 ‖ pool_marker)`, where the pool marker is
//! a single `0x00` byte when no secondary pool is given and `0x01 ‖ address` otherwise. Map keys
//! keep the order the action was built with, and integers use MessagePack's smallest encoding,
//! which is what the venue's own encoder emits.

use std::time::{SystemTime, UNIX_EPOCH};

use alloy::primitives::{keccak256, Address, B256};
use serde_json::Value;

use crate::action::types::{ActionError, ActionResult};

/// MessagePack encoding of an action object.
pub fn encode_action(action: &Value) -> ActionResult<Vec<u8>> {
    if !action.is_object() {
        return Err(ActionError::Encoding(
            "action must be a JSON object".to_string(),
        ));
    }
    rmp_serde::to_vec_named(action).map_err(|e| ActionError::Encoding(e.to_string()))
}

/// The exact byte string that gets hashed.
pub fn digest_preimage(
    action: &Value,
    secondary_pool: Option<Address>,
    nonce: u64,
) -> ActionResult<Vec<u8>> {
    let mut bytes = encode_action(action)?;
    bytes.extend_from_slice(&nonce.to_be_bytes());
    match secondary_pool {
        None => bytes.push(0x00),
        Some(pool) => {
            bytes.push(0x01);
            bytes.extend_from_slice(pool.as_slice());
        }
    }
    Ok(bytes)
}

/// 32-byte action digest, used as the phantom agent's connection id.
pub fn digest(action: &Value, secondary_pool: Option<Address>, nonce: u64) -> ActionResult<B256> {
    Ok(keccak256(digest_preimage(action, secondary_pool, nonce)?))
}

/// Accept a nonce only if it is a JSON integer in `0..=u64::MAX`.
pub fn parse_nonce(value: &Value) -> ActionResult<u64> {
    value
        .as_u64()
        .ok_or_else(|| ActionError::InvalidNonce(format!("{value} is not an unsigned 64-bit integer")))
}

/// Parse a nonce given as text, e.g. on the command line.
pub fn parse_nonce_str(raw: &str) -> ActionResult<u64> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|_| ActionError::InvalidNonce(format!("'{raw}' is not a number")))?;
    parse_nonce(&value)
}

/// Millisecond timestamp, the conventional nonce.
pub fn timestamp_nonce() -> ActionResult<u64> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| ActionError::InvalidNonce(e.to_string()))?;
    u64::try_from(elapsed.as_millis()).map_err(|e| ActionError::InvalidNonce(e.to_string()))
}
