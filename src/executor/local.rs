//! Local job executor: runs each job's task steps as shell children on
//! executor-owned tokio tasks.

use async_trait::async_trait;
use log::{error, info, warn};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{MetadataCell, RuntimeMetadata};
use crate::domain::{JobCancelMessage, JobRequestMessage, TaskStep};
use crate::error::Result;

use super::{CompletionSignal, JobExecutor};

struct RunningJob {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Production executor: one tokio task per job, one shell child per step.
pub struct LocalJobExecutor {
    metadata: Arc<MetadataCell>,
    completion: CompletionSignal,
    running: Arc<Mutex<HashMap<String, RunningJob>>>,
}

impl LocalJobExecutor {
    pub fn new(metadata: Arc<MetadataCell>) -> Self {
        Self {
            metadata,
            completion: CompletionSignal::new(),
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn run_job(request: &JobRequestMessage, snapshot: &RuntimeMetadata, token: &CancellationToken) {
        info!(
            "Job '{}' ({}) started, {} step(s), flush interval {:?}",
            request.job_name,
            request.job_id,
            request.tasks.len(),
            snapshot.log_flush_interval
        );
        for step in &request.tasks {
            if token.is_cancelled() {
                warn!("Job '{}' canceled before step '{}'", request.job_name, step.name);
                return;
            }
            if let Err(e) = Self::run_step(request, step, token).await {
                error!(
                    "Job '{}' step '{}' failed: {e}",
                    request.job_name, step.name
                );
                return;
            }
        }
        info!("Job '{}' ({}) finished", request.job_name, request.job_id);
    }

    async fn run_step(
        request: &JobRequestMessage,
        step: &TaskStep,
        token: &CancellationToken,
    ) -> Result<()> {
        let Some(script) = &step.script else {
            info!("Step '{}' has no script, skipping", step.name);
            return Ok(());
        };

        let mut child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(script)
            .envs(&request.environment)
            .stdin(Stdio::null())
            .spawn()?;

        tokio::select! {
            _ = token.cancelled() => {
                warn!("Killing step '{}' on cancellation", step.name);
                child.kill().await?;
                Ok(())
            }
            status = child.wait() => {
                let status = status?;
                if !status.success() {
                    error!("Step '{}' exited with {status}", step.name);
                }
                Ok(())
            }
        }
    }
}

#[async_trait]
impl JobExecutor for LocalJobExecutor {
    async fn start(&self, request: JobRequestMessage, single_job: bool) -> Result<()> {
        let token = CancellationToken::new();
        let job_token = token.clone();
        let job_id = request.job_id.clone();
        let snapshot = self.metadata.snapshot();
        let completion = self.completion.clone();
        let running = self.running.clone();

        // Hold the map lock across spawn+insert so a job that finishes
        // instantly cannot try to remove itself before it was inserted.
        let mut guard = self.running.lock().await;
        let map_key = job_id.clone();
        let handle = tokio::spawn(async move {
            Self::run_job(&request, &snapshot, &job_token).await;
            running.lock().await.remove(&map_key);
            if single_job {
                completion.complete();
            }
        });
        guard.insert(job_id, RunningJob { token, handle });
        Ok(())
    }

    async fn cancel(&self, cancel: &JobCancelMessage) -> Result<()> {
        let job = self.running.lock().await.remove(&cancel.job_id);
        let Some(job) = job else {
            warn!("Cancellation for unknown job {}", cancel.job_id);
            return Ok(());
        };

        info!(
            "Canceling job {} (grace {:?})",
            cancel.job_id,
            cancel.grace()
        );
        job.token.cancel();
        tokio::select! {
            _ = job.handle => {}
            _ = tokio::time::sleep(cancel.grace()) => {
                warn!("Job {} did not stop within its grace period", cancel.job_id);
            }
        }
        Ok(())
    }

    fn completion_signal(&self) -> CompletionSignal {
        self.completion.clone()
    }

    async fn shutdown(&self) -> Result<()> {
        let jobs: Vec<(String, RunningJob)> = self.running.lock().await.drain().collect();
        for (job_id, job) in jobs {
            job.token.cancel();
            if job.handle.await.is_err() {
                warn!("Job {job_id} task panicked during shutdown");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PlanReference;
    use std::time::Duration;

    fn job(job_id: &str, script: &str) -> JobRequestMessage {
        JobRequestMessage {
            plan: PlanReference {
                plan_id: "plan-1".to_string(),
                plan_type: None,
            },
            timeline: None,
            job_id: job_id.to_string(),
            job_name: format!("job-{job_id}"),
            environment: HashMap::new(),
            tasks: vec![TaskStep {
                id: "1".to_string(),
                name: "step".to_string(),
                script: Some(script.to_string()),
            }],
        }
    }

    fn executor() -> LocalJobExecutor {
        LocalJobExecutor::new(Arc::new(MetadataCell::new()))
    }

    #[tokio::test]
    async fn test_single_job_resolves_completion() {
        let executor = executor();
        let signal = executor.completion_signal();
        executor.start(job("j1", "true"), true).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), signal.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_service_job_leaves_signal_unresolved() {
        let executor = executor();
        executor.start(job("j1", "true"), false).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!executor.completion_signal().is_complete());
    }

    #[tokio::test]
    async fn test_failing_step_still_completes_single_job() {
        let executor = executor();
        let signal = executor.completion_signal();
        executor.start(job("j1", "exit 3"), true).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), signal.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancel_stops_long_running_job() {
        let executor = executor();
        executor.start(job("j9", "sleep 60"), false).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let cancel = JobCancelMessage::new("j9", Duration::from_secs(5));
        tokio::time::timeout(Duration::from_secs(5), executor.cancel(&cancel))
            .await
            .unwrap()
            .unwrap();
        assert!(executor.running.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_unknown_job_is_ok() {
        let executor = executor();
        let cancel = JobCancelMessage::new("nope", Duration::from_secs(1));
        executor.cancel(&cancel).await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_drains_running_jobs() {
        let executor = executor();
        executor.start(job("j1", "sleep 60"), false).await.unwrap();
        executor.start(job("j2", "sleep 60"), false).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        tokio::time::timeout(Duration::from_secs(5), executor.shutdown())
            .await
            .unwrap()
            .unwrap();
        assert!(executor.running.lock().await.is_empty());
    }
}
