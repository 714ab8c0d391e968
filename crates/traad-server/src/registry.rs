//! Declarative command registration.
//!
//! Transport modules describe their CLI surface as [`CommandDescriptor`]s
//! and register them on one [`CommandRegistry`] at process start. The
//! registry is an explicit context object built in `main` and consumed once
//! by [`CommandRegistry::run`]; there is no ambient global command table.
//!
//! The descriptors are turned into `clap` subcommands at parse time, so the
//! usual usage-error behavior (help text, non-zero exit) comes from clap.

use std::ffi::OsString;

use anyhow::anyhow;
use clap::{Arg, ArgAction, ArgMatches, Command};
use thiserror::Error;

/// Errors raised while populating the registry, before any dispatch.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Command registered twice: {0}")]
    DuplicateCommand(String),
}

/// One declared command parameter. Values are strings at the CLI layer;
/// handlers parse them into their concrete types.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub help: &'static str,
    pub short: Option<char>,
    pub required: bool,
    pub default_value: Option<String>,
}

impl ParamSpec {
    /// A parameter the user must always supply.
    pub fn required(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            short: None,
            required: true,
            default_value: None,
        }
    }

    /// A parameter with a default, optionally reachable through a short flag.
    pub fn with_default(
        name: &'static str,
        help: &'static str,
        short: Option<char>,
        default_value: impl Into<String>,
    ) -> Self {
        Self {
            name,
            help,
            short,
            required: false,
            default_value: Some(default_value.into()),
        }
    }

    /// An optional parameter with no default.
    pub fn optional(name: &'static str, help: &'static str, short: Option<char>) -> Self {
        Self {
            name,
            help,
            short,
            required: false,
            default_value: None,
        }
    }

    fn to_arg(&self) -> Arg {
        let mut arg = Arg::new(self.name)
            .long(self.name)
            .help(self.help)
            .action(ArgAction::Set)
            .value_name(self.name.to_uppercase());
        if let Some(short) = self.short {
            arg = arg.short(short);
        }
        if self.required {
            arg = arg.required(true);
        }
        if let Some(default) = &self.default_value {
            arg = arg.default_value(default.clone());
        }
        arg
    }
}

/// Handler invoked when a command is selected on the command line.
pub type CommandHandler = Box<dyn Fn(&ArgMatches) -> anyhow::Result<()>>;

/// A registered command: name, help, parameter declarations and handler.
pub struct CommandDescriptor {
    pub name: &'static str,
    pub about: &'static str,
    /// Whether this command may be selected implicitly when it is the only
    /// one registered and no command name is given.
    pub default: bool,
    pub params: Vec<ParamSpec>,
    pub handler: CommandHandler,
}

impl std::fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("default", &self.default)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Ordered collection of command descriptors for one process.
///
/// Built incrementally at startup, consumed exactly once by [`run`].
///
/// [`run`]: CommandRegistry::run
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: Vec<CommandDescriptor>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command. Name collisions fail here, before `run` is reachable.
    pub fn register(&mut self, descriptor: CommandDescriptor) -> Result<(), RegistryError> {
        if self.commands.iter().any(|c| c.name == descriptor.name) {
            return Err(RegistryError::DuplicateCommand(descriptor.name.to_string()));
        }
        self.commands.push(descriptor);
        Ok(())
    }

    /// Parse `args`, select a command and invoke its handler.
    ///
    /// Usage errors print to the user and exit non-zero, through clap.
    pub fn run<I, T>(&self, args: I) -> anyhow::Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        match self.try_matches(args) {
            Ok((name, matches)) => self.invoke(&name, &matches),
            Err(e) => e.exit(),
        }
    }

    /// Parse `args` into the selected command name and its matches, without
    /// exiting on usage errors.
    pub fn try_matches<I, T>(&self, args: I) -> Result<(String, ArgMatches), clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let argv = self.with_default_command(args.into_iter().map(Into::into).collect());
        let matches = self.build_cli().try_get_matches_from(argv)?;
        match matches.subcommand() {
            Some((name, sub)) => Ok((name.to_string(), sub.clone())),
            None => Err(clap::Error::raw(
                clap::error::ErrorKind::MissingSubcommand,
                "no command given\n",
            )),
        }
    }

    /// Invoke the named command's handler with already-parsed matches.
    pub fn invoke(&self, name: &str, matches: &ArgMatches) -> anyhow::Result<()> {
        let descriptor = self
            .commands
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| anyhow!("unknown command: {name}"))?;
        (descriptor.handler)(matches)
    }

    fn build_cli(&self) -> Command {
        let mut cli = Command::new("traad")
            .about("Expose a project refactoring session to remote callers")
            .version(env!("CARGO_PKG_VERSION"))
            .subcommand_required(true)
            .arg_required_else_help(true);
        for descriptor in &self.commands {
            let mut sub = Command::new(descriptor.name).about(descriptor.about);
            for param in &descriptor.params {
                sub = sub.arg(param.to_arg());
            }
            cli = cli.subcommand(sub);
        }
        cli
    }

    /// Baker-style default selection: with exactly one registered command
    /// marked default, the command name may be omitted on the command line.
    fn with_default_command(&self, mut argv: Vec<OsString>) -> Vec<OsString> {
        let Some(default) = self.sole_default() else {
            return argv;
        };
        if argv.is_empty() {
            // No program name either; leave it to clap.
            return argv;
        }
        let inject = match argv.get(1) {
            None => true,
            Some(first) => {
                let first = first.to_string_lossy();
                first != default.name
                    && !matches!(first.as_ref(), "-h" | "--help" | "-V" | "--version")
            }
        };
        if inject {
            argv.insert(1, default.name.into());
        }
        argv
    }

    fn sole_default(&self) -> Option<&CommandDescriptor> {
        match self.commands.as_slice() {
            [only] if only.default => Some(only),
            _ => None,
        }
    }
}
