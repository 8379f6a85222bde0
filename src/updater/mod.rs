//! Self-update: triggered by a refresh message, preempts all further job
//! dispatch for the remainder of the run.

pub mod package;

pub use package::PackageUpdater;

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::domain::RefreshMessage;
use crate::error::Result;
use crate::executor::JobExecutor;

/// Update collaborator awaited to completion before the loop exits.
#[async_trait]
pub trait SelfUpdater: Send + Sync {
    /// Perform the update described by `refresh`. The executor reference lets
    /// the updater drain in-flight work first. `restart_interactive` tells
    /// the relaunch step whether an interactive terminal is attached; it is
    /// never set for single-job runs.
    ///
    /// Returns `Ok(true)` when a new version was staged and a relaunch is
    /// required, `Ok(false)` when the agent is already at the target version.
    async fn self_update(
        &self,
        refresh: &RefreshMessage,
        executor: Arc<dyn JobExecutor>,
        restart_interactive: bool,
        shutdown: &CancellationToken,
    ) -> Result<bool>;
}
