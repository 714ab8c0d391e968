//! Traad server binary.
//!
//! Builds the process-wide command registry, lets each transport module
//! register its command, then hands the command line to the registry.
//! Exactly one transport serves per process.

use traad_server::{bus, rpc, CommandRegistry};

fn main() -> anyhow::Result<()> {
    let mut registry = CommandRegistry::new();
    rpc::register(&mut registry)?;
    bus::register(&mut registry)?;
    registry.run(std::env::args_os())
}
