//! CLI command definitions using clap.
//!
//! Defines the agent's command vocabulary:
//! - run: connect to the orchestration server and process messages
//! - configure: register the agent and persist settings
//! - remove: delete the agent registration and local settings
//!
//! Informational flags terminate immediately with Success; anything clap
//! rejects terminates with TerminatedError.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::ReturnCode;

/// Source commit this binary was built from.
pub const BUILD_COMMIT: &str = env!("BUILD_COMMIT");

/// Drover - a build agent for distributed pipeline execution
#[derive(Parser, Debug)]
#[command(name = "drover")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Print the source commit this binary was built from
    #[arg(long)]
    pub commit: bool,

    /// Subcommand to execute (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to the orchestration server and process messages
    Run {
        /// Process exactly one job, then exit
        #[arg(long)]
        once: bool,
    },

    /// Configure the agent against an orchestration server
    Configure(ConfigureArgs),

    /// Remove the agent configuration
    Remove,
}

/// Arguments for `drover configure`
#[derive(Args, Debug, Clone)]
pub struct ConfigureArgs {
    /// Orchestration server URL
    #[arg(long)]
    pub url: String,

    /// Pool to register the agent into
    #[arg(long, default_value_t = 1)]
    pub pool: u64,

    /// Agent name (defaults to the host name)
    #[arg(long)]
    pub name: Option<String>,

    /// Work folder for job execution
    #[arg(long, default_value = "_work")]
    pub work: PathBuf,

    /// Install the host service unit alongside the settings
    #[arg(long)]
    pub run_as_service: bool,
}

/// Outcome of parsing the raw argument vector.
#[derive(Debug)]
pub enum Parsed {
    /// Arguments parsed into a command
    Command(Cli),
    /// Parsing ended the invocation (help/version/bad token)
    Exit(ReturnCode),
}

/// Parse arguments, mapping clap's early exits onto the agent's return codes.
///
/// `--help` and `--version` are informational and map to Success; any
/// unrecognized token maps to TerminatedError without further work.
pub fn parse_args<I, T>(args: I) -> Parsed
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => Parsed::Command(cli),
        Err(err) => {
            use clap::error::ErrorKind;
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ReturnCode::Success,
                _ => ReturnCode::TerminatedError,
            };
            let _ = err.print();
            Parsed::Exit(code)
        }
    }
}
