//! Drover - a build agent for distributed pipeline execution
//!
//! The agent registers a session with an orchestration server, pulls control
//! messages one at a time, and reacts by dispatching jobs, canceling running
//! jobs, applying runtime metadata, or performing a self-update. It runs
//! either as a long-lived service or for exactly one job (`run --once`).

pub mod agent;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod executor;
pub mod service;
pub mod source;
pub mod updater;

pub use error::{DroverError, Result};
