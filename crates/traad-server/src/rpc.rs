//! The `rpc` command: synchronous JSON-RPC front end.

use std::path::PathBuf;

use anyhow::Context;
use clap::ArgMatches;
use tracing::info;
use traad_session::ProjectSession;

use crate::registry::{CommandDescriptor, CommandRegistry, ParamSpec, RegistryError};
use crate::{logging, server};

/// Register the `rpc` command on the process registry.
pub fn register(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register(CommandDescriptor {
        name: "rpc",
        about: "Run a JSON-RPC traad server",
        default: true,
        params: vec![
            ParamSpec::required("project", "The directory containing the project to serve."),
            ParamSpec::with_default(
                "port",
                "The port on which the server will listen.",
                Some('p'),
                "6942",
            ),
            ParamSpec::with_default(
                "verbosity",
                "Verbosity level (0=normal, 1=info, 2=debug).",
                Some('v'),
                "0",
            ),
        ],
        handler: Box::new(|matches| run(RpcOptions::from_matches(matches)?)),
    })
}

#[derive(Debug)]
struct RpcOptions {
    project: PathBuf,
    port: u16,
    verbosity: u8,
}

impl RpcOptions {
    fn from_matches(matches: &ArgMatches) -> anyhow::Result<Self> {
        let project = matches
            .get_one::<String>("project")
            .context("missing project parameter")?
            .into();
        let port = matches
            .get_one::<String>("port")
            .context("missing port parameter")?
            .parse()
            .context("port must be an integer")?;
        let verbosity = matches
            .get_one::<String>("verbosity")
            .context("missing verbosity parameter")?
            .parse()
            .context("verbosity must be an integer")?;
        Ok(Self {
            project,
            port,
            verbosity,
        })
    }
}

fn run(opts: RpcOptions) -> anyhow::Result<()> {
    logging::init_logging(opts.verbosity)?;
    logging::log_basic_info();

    let session = ProjectSession::new(&opts.project)?;
    info!(
        "Running traad rpc server for project \"{}\" on port {}",
        session.root().display(),
        opts.port
    );

    // One request at a time: single-threaded runtime plus the session lock.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(server::serve(session, opts.port))
}
