//! Offline EVM transaction signing, single-shot broadcast and typed-data action authorization.

pub mod action;
pub mod config;
pub mod lifecycle;
pub mod nonce;
pub mod observability;
pub mod persist;
pub mod signer;
pub mod transaction;

pub use config::schema::OpsConfig;
pub use signer::{ChainSigner, SignerBackend};
