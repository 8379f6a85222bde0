//! The agent core: top-level command dispatch and the message loop.

pub mod listener;

pub use listener::{Agent, RUN_ONCE_WAIT};
