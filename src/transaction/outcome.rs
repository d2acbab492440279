//! Submission errors that mean the work is already done.
//!
//! Re-running an initialization step against a contract that was initialized earlier reverts
//! with one of a handful of messages. Those runs should end cleanly instead of failing the
//! pipeline. Matching is a case-insensitive substring test on the node's error text, so it is
//! only as reliable as the revert strings: new contracts with different wording will not match.

const ALREADY_INITIALIZED_PATTERNS: &[&str] = &[
    "already initialized",
    "already been initialized",
    "alreadyinitialized",
    "already initialised",
    "alreadyinitialised",
];

/// The allow-list entry `message` matches, if any.
pub fn already_applied(message: &str) -> Option<&'static str> {
    let lowered = message.to_lowercase();
    ALREADY_INITIALIZED_PATTERNS
        .iter()
        .copied()
        .find(|pattern| lowered.contains(pattern))
}
