//! Server-side configuration errors.
//!
//! These cover the failures that must surface before a transport binds:
//! bad verbosity values and logging initialization problems. Command
//! registration failures live in [`crate::registry::RegistryError`] and
//! session failures in `traad_session::SessionError`.

use thiserror::Error;

/// Configuration errors raised while bringing a server command up.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown verbosity level: {0} (expected 0, 1 or 2)")]
    UnknownVerbosity(u8),

    #[error("Logging is already initialized for this process")]
    LoggingInit(#[from] tracing::subscriber::SetGlobalDefaultError),
}
