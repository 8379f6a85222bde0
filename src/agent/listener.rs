//! Session lifecycle and the fetch/route cycle.
//!
//! One `Agent` owns one invocation: it creates the session, fetches control
//! messages one at a time, routes each to a collaborator, acknowledges it,
//! and tears the session down exactly once on every exit path. Two lifetimes
//! share the loop: Service (unbounded) and RunOnce (single dispatch).

use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, Commands, BUILD_COMMIT};
use crate::config::{ConfigManager, MetadataCell, SettingsStore};
use crate::domain::{
    kinds, Envelope, JobCancelMessage, JobRequestMessage, MetadataMessage, RefreshMessage,
    ReturnCode, RunMode,
};
use crate::error::{DroverError, Result};
use crate::executor::JobExecutor;
use crate::source::MessageSource;
use crate::updater::SelfUpdater;

/// Bound on how long a run-once invocation waits for its first message.
/// Run-once callers expect the process to exit; it must never hang on an
/// empty queue.
pub const RUN_ONCE_WAIT: Duration = Duration::from_secs(300);

/// One agent invocation and its collaborators.
pub struct Agent {
    config: Arc<dyn ConfigManager>,
    store: Arc<dyn SettingsStore>,
    source: Arc<dyn MessageSource>,
    executor: Arc<dyn JobExecutor>,
    updater: Arc<dyn SelfUpdater>,
    metadata: Arc<MetadataCell>,
    shutdown: CancellationToken,
}

impl Agent {
    pub fn new(
        config: Arc<dyn ConfigManager>,
        store: Arc<dyn SettingsStore>,
        source: Arc<dyn MessageSource>,
        executor: Arc<dyn JobExecutor>,
        updater: Arc<dyn SelfUpdater>,
        metadata: Arc<MetadataCell>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            store,
            source,
            executor,
            updater,
            metadata,
            shutdown,
        }
    }

    /// Dispatch one parsed invocation to its command, yielding exactly one
    /// return code or the canceled state.
    pub async fn execute(&self, cli: &Cli) -> Result<ReturnCode> {
        if cli.commit {
            println!("{BUILD_COMMIT}");
            return Ok(ReturnCode::Success);
        }

        match &cli.command {
            Some(Commands::Configure(args)) => match self.config.configure(args).await {
                Ok(()) => Ok(ReturnCode::Success),
                Err(e) => {
                    error!("Configure failed: {e}");
                    Ok(ReturnCode::TerminatedError)
                }
            },
            Some(Commands::Remove) => match self.config.unconfigure().await {
                Ok(()) => Ok(ReturnCode::Success),
                Err(e) => {
                    error!("Remove failed: {e}");
                    Ok(ReturnCode::TerminatedError)
                }
            },
            Some(Commands::Run { once }) => self.run(*once).await,
            None => self.run(false).await,
        }
    }

    /// Create the session, run the message loop, and tear the session down
    /// exactly once whatever the exit path.
    async fn run(&self, once: bool) -> Result<ReturnCode> {
        if !self.config.is_configured() {
            error!("Agent is not configured; run `drover configure` first");
            return Ok(ReturnCode::TerminatedError);
        }

        let mode = if once { RunMode::RunOnce } else { RunMode::Service };
        // Interactive relaunch only makes sense outside a host-managed
        // service and outside single-job runs.
        let interactive = !self.store.is_service_configured();
        info!("Starting agent in {mode:?} mode");

        if !self.source.create_session(&self.shutdown).await? {
            error!("Server refused the session; not entering the message loop");
            return Ok(ReturnCode::TerminatedError);
        }

        let outcome = self.message_loop(mode, interactive).await;

        if let Err(e) = self.source.delete_session().await {
            warn!("Session teardown failed: {e}");
        }

        outcome
    }

    /// The fetch/route cycle. Envelopes are processed one at a time in
    /// retrieval order; acknowledgment happens strictly after the routing
    /// decision and strictly before the next fetch.
    async fn message_loop(&self, mode: RunMode, interactive: bool) -> Result<ReturnCode> {
        let mut job_dispatched = false;

        loop {
            if mode.is_run_once() && job_dispatched {
                // The single job is out; stop fetching and wait for it.
                let completion = self.executor.completion_signal();
                tokio::select! {
                    _ = self.shutdown.cancelled() => return Err(DroverError::Canceled),
                    _ = completion.wait() => {
                        info!("Single job completed");
                        return Ok(ReturnCode::Success);
                    }
                }
            }

            let envelope = match self.next_envelope(mode).await {
                Ok(envelope) => envelope,
                Err(DroverError::RunOnceTimeout(wait)) => {
                    error!("No message arrived within {wait:?}");
                    return Ok(ReturnCode::TerminatedError);
                }
                Err(e) => return Err(e),
            };

            let decision = self
                .route(&envelope, mode, interactive, &mut job_dispatched)
                .await;
            self.source.delete_message(&envelope).await?;

            if let Some(code) = decision? {
                return Ok(code);
            }
        }
    }

    async fn next_envelope(&self, mode: RunMode) -> Result<Envelope> {
        if mode.is_run_once() {
            match tokio::time::timeout(
                RUN_ONCE_WAIT,
                self.source.get_next_message(&self.shutdown),
            )
            .await
            {
                Ok(fetched) => fetched,
                Err(_) => Err(DroverError::RunOnceTimeout(RUN_ONCE_WAIT)),
            }
        } else {
            self.source.get_next_message(&self.shutdown).await
        }
    }

    /// Route one envelope. `Ok(Some(code))` ends the loop; `Ok(None)`
    /// continues it. Malformed payloads and collaborator faults are
    /// contained here; only cancellation escapes as an error.
    async fn route(
        &self,
        envelope: &Envelope,
        mode: RunMode,
        interactive: bool,
        job_dispatched: &mut bool,
    ) -> Result<Option<ReturnCode>> {
        match envelope.kind.as_str() {
            kinds::JOB_REQUEST => {
                match envelope.decode::<JobRequestMessage>() {
                    Ok(request) => {
                        info!("Dispatching job '{}' ({})", request.job_name, request.job_id);
                        match self.executor.start(request, mode.is_run_once()).await {
                            Ok(()) => *job_dispatched = true,
                            Err(e) if e.is_canceled() => return Err(e),
                            Err(e) => error!("Job dispatch failed: {e}"),
                        }
                    }
                    Err(e) => warn!("Ignoring malformed job request: {e}"),
                }
                Ok(None)
            }
            kinds::JOB_CANCEL => {
                match envelope.decode::<JobCancelMessage>() {
                    Ok(cancel) => match self.executor.cancel(&cancel).await {
                        Ok(()) => {}
                        Err(e) if e.is_canceled() => return Err(e),
                        Err(e) => error!("Job cancellation failed: {e}"),
                    },
                    Err(e) => warn!("Ignoring malformed job cancellation: {e}"),
                }
                Ok(None)
            }
            kinds::METADATA_UPDATE => {
                match envelope.decode::<MetadataMessage>() {
                    Ok(update) => self.metadata.apply(&update),
                    Err(e) => warn!("Ignoring malformed metadata update: {e}"),
                }
                Ok(None)
            }
            kinds::AGENT_REFRESH => {
                let refresh = match envelope.decode::<RefreshMessage>() {
                    Ok(refresh) => refresh,
                    Err(e) => {
                        warn!("Ignoring malformed refresh trigger: {e}");
                        return Ok(None);
                    }
                };
                // A refresh preempts all further dispatch for this run, even
                // when the update itself fails.
                let restart_interactive = interactive && !mode.is_run_once();
                match self
                    .updater
                    .self_update(
                        &refresh,
                        self.executor.clone(),
                        restart_interactive,
                        &self.shutdown,
                    )
                    .await
                {
                    Ok(staged) => info!("Self-update finished (staged: {staged})"),
                    Err(e) if e.is_canceled() => return Err(e),
                    Err(e) => error!("Self-update failed: {e}"),
                }
                Ok(Some(ReturnCode::RunOnceUpdating))
            }
            other => {
                debug!("Ignoring unrecognized message kind '{other}'");
                Ok(None)
            }
        }
    }
}
