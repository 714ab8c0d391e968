//! Traad server - transport front ends for a refactoring session.
//!
//! This crate wraps one [`traad_session::ProjectSession`] and exposes it to
//! remote callers through two alternative front ends:
//!
//! - a synchronous JSON-RPC server over loopback TCP ([`rpc`]), and
//! - a service-object server on a local message bus ([`bus`]).
//!
//! Exactly one front end runs per process, selected through the command
//! registry ([`registry`]) that the `traad` binary populates at startup.
//! Every dispatched call is instrumented by the call tracer ([`trace`]).

pub mod bus;
pub mod error;
pub mod handler;
pub mod logging;
pub mod registry;
pub mod rpc;
pub mod server;
pub mod trace;

pub use error::ServerError;
pub use registry::{CommandDescriptor, CommandRegistry, ParamSpec, RegistryError};
