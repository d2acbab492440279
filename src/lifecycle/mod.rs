//! Process lifecycle.
//!
//! # Data Flow
//! ```text
//! command future ─┐
//!                 ├─ select → Finished(output) | Interrupted(signal)
//! SIGINT/SIGTERM ─┘
//!     → caller closes hardware sessions either way, then exits
//! ```

pub mod signals;

pub use signals::{shutdown_signal, until_shutdown, Completion};
