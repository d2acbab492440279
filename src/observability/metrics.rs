//! Metrics collection.
//!
//! # Metrics
//! - `chain_ops_transactions_signed_total` (counter): signed transactions by chain, tx type
//! - `chain_ops_broadcasts_total` (counter): broadcast attempts by chain, outcome
//! - `chain_ops_authorizations_total` (counter): authorization posts by outcome
//! - `chain_ops_device_sessions_total` (counter): hardware session opens/closes/failures
//!
//! # Design Decisions
//! - Counters only; the CLI is a one-shot process and installs no exporter
//! - Library users may install any `metrics` recorder to collect them

use metrics::counter;

/// Record a transaction signed and persisted for broadcast.
pub fn record_transaction_signed(chain: &str, tx_type: u8) {
    counter!(
        "chain_ops_transactions_signed_total",
        "chain" => chain.to_string(),
        "type" => tx_type.to_string()
    )
    .increment(1);
}

/// Record the outcome of a broadcast run ("success", "failed", "skipped", "already_applied").
pub fn record_broadcast(chain: &str, outcome: &'static str) {
    counter!(
        "chain_ops_broadcasts_total",
        "chain" => chain.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record the outcome of a remote authorization post ("ok", "rejected", "transport").
pub fn record_authorization(outcome: &'static str) {
    counter!("chain_ops_authorizations_total", "outcome" => outcome).increment(1);
}

/// Record a hardware session event ("open", "close", "unavailable").
pub fn record_device_session(event: &'static str) {
    counter!("chain_ops_device_sessions_total", "event" => event).increment(1);
}
