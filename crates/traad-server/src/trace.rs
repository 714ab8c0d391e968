//! Call tracing for dispatched session operations.
//!
//! Every remote call, whichever transport carried it, goes through
//! [`traced`]: one info record on entry with a bounded rendering of the
//! arguments, and on failure one error record with the full error chain
//! before the failure propagates unchanged. The tracer never suppresses or
//! translates errors, so the transport layer still sees the original type.

use std::fmt::Write as _;

use serde_json::Value;
use tracing::{error, info};

/// Upper bound on the logged form of a single argument. Arguments can be
/// whole source files; the entry record must stay one line of sane length.
const MAX_REPR_LEN: usize = 200;

/// Render an argument for the entry log record.
///
/// Values at most [`MAX_REPR_LEN`] characters render verbatim; longer ones
/// are cut to exactly [`MAX_REPR_LEN`] characters including a trailing
/// `...` marker. Truncation counts characters, not bytes, so multi-byte
/// input never splits.
pub fn short_repr(value: &Value) -> String {
    let repr = value.to_string();
    if repr.chars().count() <= MAX_REPR_LEN {
        return repr;
    }
    let mut short: String = repr.chars().take(MAX_REPR_LEN - 3).collect();
    short.push_str("...");
    short
}

/// Render an error and its source chain on one line.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let _ = write!(rendered, ": caused by: {cause}");
        source = cause.source();
    }
    rendered
}

/// Invoke `f`, logging the call on entry and any failure on the way out.
///
/// The return value and any error pass through unchanged; the only side
/// effect is logging. Failures are logged exactly once here, at the point
/// they cross the handler boundary.
pub fn traced<T, E, F>(name: &str, args: &[Value], f: F) -> Result<T, E>
where
    E: std::error::Error,
    F: FnOnce() -> Result<T, E>,
{
    let rendered: Vec<String> = args.iter().map(short_repr).collect();
    info!("{}({})", name, rendered.join(", "));

    match f() {
        Ok(value) => Ok(value),
        Err(e) => {
            error!("Exception in {}: {}", name, error_chain(&e));
            Err(e)
        }
    }
}
