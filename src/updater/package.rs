//! Production updater: downloads the agent package, verifies its digest
//! against the configured fingerprints, and stages it for relaunch.

use async_trait::async_trait;
use log::{info, warn};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::domain::{AgentSettings, RefreshMessage, VerificationMode};
use crate::error::{DroverError, Result};
use crate::executor::JobExecutor;

use super::SelfUpdater;

const UPDATE_DIR: &str = "_update";

/// Downloads and stages a new agent package under the work folder.
pub struct PackageUpdater {
    client: reqwest::Client,
    settings: AgentSettings,
    current_version: String,
}

impl PackageUpdater {
    pub fn new(settings: AgentSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
            current_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    #[cfg(test)]
    fn with_version(settings: AgentSettings, version: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
            current_version: version.to_string(),
        }
    }

    fn package_url(&self, version: &str) -> String {
        format!("{}/packages/agent/{version}", self.settings.server_url)
    }

    fn staging_path(&self, version: &str) -> PathBuf {
        self.settings
            .work_folder
            .join(UPDATE_DIR)
            .join(format!("drover-{version}.tar.gz"))
    }

    /// Check the package digest against the configured fingerprint list.
    fn verify(&self, package: &[u8]) -> Result<()> {
        let Some(policy) = &self.settings.signature_verification else {
            return Ok(());
        };
        if policy.mode == VerificationMode::None {
            return Ok(());
        }

        let digest = hex::encode(Sha256::digest(package));
        if policy
            .fingerprints
            .iter()
            .any(|f| f.eq_ignore_ascii_case(&digest))
        {
            info!("Package digest {digest} matches a configured fingerprint");
            return Ok(());
        }

        match policy.mode {
            VerificationMode::Error => Err(DroverError::Update(format!(
                "package digest {digest} matches no configured fingerprint"
            ))),
            VerificationMode::Warning => {
                warn!("Package digest {digest} matches no configured fingerprint");
                Ok(())
            }
            VerificationMode::None => Ok(()),
        }
    }

    fn stage(&self, version: &str, package: &[u8]) -> Result<PathBuf> {
        let path = self.staging_path(version);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        std::fs::write(&path, package)?;
        Ok(path)
    }

    async fn download(&self, version: &str, shutdown: &CancellationToken) -> Result<Vec<u8>> {
        let url = self.package_url(version);
        info!("Downloading agent package from {url}");
        let response = tokio::select! {
            _ = shutdown.cancelled() => return Err(DroverError::Canceled),
            r = self.client.get(&url).send() => r?.error_for_status()?,
        };
        let body = tokio::select! {
            _ = shutdown.cancelled() => return Err(DroverError::Canceled),
            b = response.bytes() => b?,
        };
        Ok(body.to_vec())
    }
}

#[async_trait]
impl SelfUpdater for PackageUpdater {
    async fn self_update(
        &self,
        refresh: &RefreshMessage,
        executor: Arc<dyn JobExecutor>,
        restart_interactive: bool,
        shutdown: &CancellationToken,
    ) -> Result<bool> {
        if refresh.target_version == self.current_version {
            info!(
                "Already at version {}, skipping update",
                self.current_version
            );
            return Ok(false);
        }

        info!(
            "Updating {} -> {} (interactive relaunch: {restart_interactive})",
            self.current_version, refresh.target_version
        );

        // Drain in-flight work before touching the install.
        executor.shutdown().await?;

        let package = self.download(&refresh.target_version, shutdown).await?;
        self.verify(&package)?;
        let staged = self.stage(&refresh.target_version, &package)?;
        info!("Update staged at {}", staged.display());
        Ok(true)
    }
}
