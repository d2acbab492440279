//! Offline transaction signing and broadcast pipeline.
//!
//! # Data Flow
//! ```text
//! TxFields + chain gas defaults + ledger nonce
//!     → builder.rs (validated BaseTx, no node access when offline)
//!     → ChainSigner (raw signed bytes)
//!     → record.rs (PENDING record written atomically, ledger advanced)
//!
//! later, possibly another process:
//! record.rs load
//!     → broadcast.rs (PENDING only: verify signedTx, submit, wait for confirmations)
//!     → client.rs (alloy providers with failover)
//!     → record.rs (SUCCESS with hash, or FAILED with error)
//! ```

pub mod broadcast;
pub mod builder;
pub mod client;
pub mod outcome;
pub mod record;
pub mod types;

pub use broadcast::{
    explorer_link, verify_signed, BatchEntry, BroadcastOutcome, BroadcastProcessor,
};
pub use builder::TxBuilder;
pub use client::{Confirmation, NodeClient, RpcClient};
pub use record::TransactionRecord;
pub use types::{
    BaseTx, BuildOptions, RecordStatus, TransactionError, TransactionResult, TxFields,
};
