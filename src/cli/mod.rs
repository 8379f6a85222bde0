//! CLI module for drover - command-line surface and exit-code mapping.
//!
//! The agent understands a small command vocabulary: `run` (optionally
//! `--once`), `configure`, `remove`, and the informational flags
//! `--help`, `--version`, `--commit`.

pub mod commands;

pub use commands::{BUILD_COMMIT, Cli, Commands, ConfigureArgs, Parsed, parse_args};
