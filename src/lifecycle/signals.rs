//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT (Ctrl-C) or SIGTERM
//! - Race a command against those signals so cleanup code still runs on interrupt
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - An interrupted command is abandoned mid-flight; files on disk keep their last complete state

use std::future::Future;

/// How a command ended.
#[derive(Debug, PartialEq, Eq)]
pub enum Completion<T> {
    Finished(T),
    Interrupted(&'static str),
}

/// Resolve when the process is asked to stop, returning the signal name.
pub async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}

/// Run `work` unless a shutdown signal arrives first.
pub async fn until_shutdown<F: Future>(work: F) -> Completion<F::Output> {
    tokio::select! {
        output = work => Completion::Finished(output),
        signal = shutdown_signal() => {
            tracing::warn!(signal, "Interrupted, aborting command");
            Completion::Interrupted(signal)
        }
    }
}
