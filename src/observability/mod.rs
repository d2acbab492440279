//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → Operator terminal (stderr, pretty or JSON)
//!     → Any installed `metrics` recorder
//! ```
//!
//! # Design Decisions
//! - Structured fields (chain, address, nonce, path) on every pipeline event
//! - Key material is never logged

pub mod logging;
pub mod metrics;
