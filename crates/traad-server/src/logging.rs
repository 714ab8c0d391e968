//! Process-wide logging bootstrap.
//!
//! Transport commands call [`init_logging`] exactly once, before anything
//! else logs. The verbosity table is deliberately strict: values outside
//! {0, 1, 2} are a configuration error, not something to clamp, so a typo
//! in a service file surfaces immediately instead of silently muting logs.

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::error::ServerError;

/// Map a verbosity level onto a logging threshold.
///
/// 0 = warnings and above, 1 = info and above, 2 = debug and above.
pub fn verbosity_level(verbosity: u8) -> Result<Level, ServerError> {
    match verbosity {
        0 => Ok(Level::WARN),
        1 => Ok(Level::INFO),
        2 => Ok(Level::DEBUG),
        other => Err(ServerError::UnknownVerbosity(other)),
    }
}

/// Install the process-wide subscriber at the threshold `verbosity` selects.
///
/// Fails without touching logging state when the verbosity is unknown, and
/// fails if a subscriber is already installed (callers must call this once,
/// early).
pub fn init_logging(verbosity: u8) -> Result<(), ServerError> {
    let level = verbosity_level(verbosity)?;
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Emit one informational record describing the runtime, for support
/// diagnostics.
pub fn log_basic_info() {
    info!(
        "traad server {} ({}-{})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH,
    );
}
