//! Off-chain action authorization.
//!
//! # Data Flow
//! ```text
//! action (JSON object) + nonce + optional secondary pool
//!     → encoder.rs (msgpack ‖ nonce ‖ pool marker → keccak256 digest)
//!     → authorization.rs (Agent{source, connectionId} signed under EIP-712)
//!     → client.rs (POST envelope, status == "ok" or typed failure)
//! ```

pub mod authorization;
pub mod client;
pub mod encoder;
pub mod types;

pub use authorization::{authorize, domain_from_config, sign_action, Agent};
pub use client::AuthorizationClient;
pub use encoder::digest;
pub use types::{ActionEnvelope, ActionError, ActionResult, AuthSignature};
