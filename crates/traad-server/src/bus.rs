//! The `bus` command: service-object front end on a local message bus.
//!
//! The bus is a session-scoped unix socket carrying newline-delimited JSON
//! messages. A [`ServiceObject`] is an explicit method table: an object
//! path, an interface name, and a set of members with declared input/output
//! signatures. Dispatch is a pure function over that table, so the method
//! surface is testable without any socket, and configurable without
//! touching the serve loop.
//!
//! The surface exposed here is deliberately narrower than the JSON-RPC
//! front end: bus consumers only need read-side queries today. Widening it
//! is a matter of adding [`ServiceMethod`]s to [`project_server`].

use std::path::PathBuf;

use anyhow::Context;
use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use traad_session::{ProjectSession, SessionError};

use crate::logging;
use crate::registry::{CommandDescriptor, CommandRegistry, ParamSpec, RegistryError};
use crate::trace::{error_chain, traced};

/// Object path the project server is registered under.
pub const OBJECT_PATH: &str = "/traad/ProjectServer";
/// Interface name of the project server's methods.
pub const INTERFACE: &str = "traad.ProjectServer";

pub const ERROR_UNKNOWN_METHOD: &str = "org.traad.Error.UnknownMethod";
pub const ERROR_INVALID_ARGS: &str = "org.traad.Error.InvalidArgs";
pub const ERROR_INVALID_MESSAGE: &str = "org.traad.Error.InvalidMessage";
pub const ERROR_FAILED: &str = "org.traad.Error.Failed";

/// One incoming bus method call.
#[derive(Debug, Serialize, Deserialize)]
pub struct BusCall {
    pub path: String,
    pub interface: String,
    pub member: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// Reply to a bus call: exactly one of `result` or `error`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BusReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BusFault>,
}

/// A named bus error, mirroring D-Bus error conventions.
#[derive(Debug, Serialize, Deserialize)]
pub struct BusFault {
    pub name: String,
    pub message: String,
}

impl BusReply {
    pub fn success(result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn fault(name: &str, message: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(BusFault {
                name: name.to_string(),
                message: message.into(),
            }),
        }
    }
}

type MethodHandler =
    Box<dyn Fn(&mut ProjectSession, &[Value]) -> Result<Value, SessionError> + Send>;

/// One declared bus method with its wire signatures.
pub struct ServiceMethod {
    pub member: &'static str,
    pub in_signature: &'static str,
    pub out_signature: &'static str,
    handler: MethodHandler,
}

impl ServiceMethod {
    pub fn new(
        member: &'static str,
        in_signature: &'static str,
        out_signature: &'static str,
        handler: impl Fn(&mut ProjectSession, &[Value]) -> Result<Value, SessionError>
            + Send
            + 'static,
    ) -> Self {
        Self {
            member,
            in_signature,
            out_signature,
            handler: Box::new(handler),
        }
    }
}

/// A named object on the bus: path, interface, and its method table.
pub struct ServiceObject {
    path: &'static str,
    interface: &'static str,
    methods: Vec<ServiceMethod>,
}

impl ServiceObject {
    pub fn new(path: &'static str, interface: &'static str, methods: Vec<ServiceMethod>) -> Self {
        Self {
            path,
            interface,
            methods,
        }
    }

    /// Dispatch one call against the method table. Never panics and never
    /// drops the failure kind: session errors come back as named faults.
    pub fn dispatch(&self, session: &mut ProjectSession, call: &BusCall) -> BusReply {
        if call.path != self.path || call.interface != self.interface {
            return BusReply::fault(
                ERROR_UNKNOWN_METHOD,
                format!("no object {} with interface {}", call.path, call.interface),
            );
        }
        let Some(method) = self.methods.iter().find(|m| m.member == call.member) else {
            return BusReply::fault(
                ERROR_UNKNOWN_METHOD,
                format!("{} has no member {}", self.interface, call.member),
            );
        };
        if method.in_signature.is_empty() && !call.args.is_empty() {
            return BusReply::fault(
                ERROR_INVALID_ARGS,
                format!("{} takes no arguments", call.member),
            );
        }

        match traced(&format!("{}.{}", self.interface, call.member), &call.args, || {
            (method.handler)(session, &call.args)
        }) {
            Ok(value) => BusReply::success(value),
            Err(e) => BusReply::fault(ERROR_FAILED, error_chain(&e)),
        }
    }
}

/// The project server's bus surface.
pub fn project_server() -> ServiceObject {
    ServiceObject::new(
        OBJECT_PATH,
        INTERFACE,
        vec![
            ServiceMethod::new("get_all_resources", "", "a(sb)", |session, _args| {
                let resources = session.get_all_resources()?;
                Ok(Value::Array(
                    resources
                        .into_iter()
                        .map(|r| json!([r.path, r.is_folder]))
                        .collect(),
                ))
            }),
            ServiceMethod::new("undo_history", "", "as", |session, _args| {
                Ok(session.undo_history().into())
            }),
            ServiceMethod::new("redo_history", "", "as", |session, _args| {
                Ok(session.redo_history().into())
            }),
        ],
    )
}

/// Default bus endpoint: session runtime dir when available.
pub fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("traad-bus.sock")
}

/// Register the `bus` command on the process registry.
pub fn register(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register(CommandDescriptor {
        name: "bus",
        about: "Run a traad server on the local message bus",
        default: true,
        params: vec![
            ParamSpec::required("project", "The directory containing the project to serve."),
            ParamSpec::with_default(
                "socket",
                "Path of the bus socket to bind.",
                None,
                default_socket_path().to_string_lossy(),
            ),
            ParamSpec::with_default(
                "verbosity",
                "Verbosity level (0=normal, 1=info, 2=debug).",
                Some('v'),
                "0",
            ),
        ],
        handler: Box::new(|matches| run(BusOptions::from_matches(matches)?)),
    })
}

#[derive(Debug)]
struct BusOptions {
    project: PathBuf,
    socket: PathBuf,
    verbosity: u8,
}

impl BusOptions {
    fn from_matches(matches: &ArgMatches) -> anyhow::Result<Self> {
        let project = matches
            .get_one::<String>("project")
            .context("missing project parameter")?
            .into();
        let socket = matches
            .get_one::<String>("socket")
            .context("missing socket parameter")?
            .into();
        let verbosity = matches
            .get_one::<String>("verbosity")
            .context("missing verbosity parameter")?
            .parse()
            .context("verbosity must be an integer")?;
        Ok(Self {
            project,
            socket,
            verbosity,
        })
    }
}

fn run(opts: BusOptions) -> anyhow::Result<()> {
    logging::init_logging(opts.verbosity)?;
    logging::log_basic_info();

    let session = ProjectSession::new(&opts.project)?;
    info!(
        "Running traad bus server for project \"{}\"",
        session.root().display()
    );

    run_serve(session, opts.socket)
}

/// One request at a time: single-threaded runtime, one serve loop.
#[cfg(unix)]
fn run_serve(session: ProjectSession, socket: PathBuf) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(session, project_server(), &socket))
}

#[cfg(not(unix))]
fn run_serve(_session: ProjectSession, _socket: PathBuf) -> anyhow::Result<()> {
    anyhow::bail!("the bus transport requires a unix platform")
}

#[cfg(unix)]
pub async fn serve(
    mut session: ProjectSession,
    object: ServiceObject,
    socket: &std::path::Path,
) -> anyhow::Result<()> {
    use tokio::net::UnixListener;

    // A stale socket file from a crashed run would make bind fail.
    if socket.exists() {
        std::fs::remove_file(socket)
            .with_context(|| format!("removing stale socket {}", socket.display()))?;
    }
    let listener = UnixListener::bind(socket)
        .with_context(|| format!("binding bus socket {}", socket.display()))?;
    info!("Bus listening on {}", socket.display());

    let result = serve_loop(&listener, &object, &mut session).await;
    let _ = std::fs::remove_file(socket);
    info!("Bus server stopped");
    result
}

#[cfg(unix)]
async fn serve_loop(
    listener: &tokio::net::UnixListener,
    object: &ServiceObject,
    session: &mut ProjectSession,
) -> anyhow::Result<()> {
    use tracing::warn;

    // Registered once up front: an interrupt that arrives while a
    // connection is being served still completes the shutdown afterwards.
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _) = accepted?;
                if let Err(e) = handle_connection(stream, object, session).await {
                    warn!("Bus connection error: {e:#}");
                }
            }
            _ = &mut interrupt => {
                info!("Interrupt received, shutting down");
                return Ok(());
            }
        }
    }
}

#[cfg(unix)]
async fn handle_connection(
    stream: tokio::net::UnixStream,
    object: &ServiceObject,
    session: &mut ProjectSession,
) -> anyhow::Result<()> {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<BusCall>(&line) {
            Ok(call) => object.dispatch(session, &call),
            Err(e) => BusReply::fault(ERROR_INVALID_MESSAGE, e.to_string()),
        };
        let mut payload = serde_json::to_vec(&reply)?;
        payload.push(b'\n');
        writer.write_all(&payload).await?;
    }
    Ok(())
}
