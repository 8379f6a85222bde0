//! Configure/remove collaborator.
//!
//! Validates the configure arguments, persists the settings document, and
//! generates the host service unit when requested. Errors raised here are
//! mapped to TerminatedError by the top-level command dispatch.

use async_trait::async_trait;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::ConfigureArgs;
use crate::domain::AgentSettings;
use crate::error::{DroverError, Result};
use crate::service;

use super::store::SettingsStore;

/// Configuration operations consumed by the top-level command dispatch.
#[async_trait]
pub trait ConfigManager: Send + Sync {
    /// True once settings have been persisted
    fn is_configured(&self) -> bool;

    /// Load the persisted settings; fails fast when none exist
    fn load_settings(&self) -> Result<AgentSettings>;

    /// Register the agent and persist its settings
    async fn configure(&self, args: &ConfigureArgs) -> Result<()>;

    /// Remove the agent registration and local state
    async fn unconfigure(&self) -> Result<()>;
}

/// Production configuration manager backed by the settings store.
pub struct ConfigurationManager {
    store: Arc<dyn SettingsStore>,
    root: PathBuf,
}

impl ConfigurationManager {
    pub fn new(store: Arc<dyn SettingsStore>, root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            root: root.into(),
        }
    }

    fn build_settings(args: &ConfigureArgs) -> Result<AgentSettings> {
        if !args.url.starts_with("http://") && !args.url.starts_with("https://") {
            return Err(DroverError::Configuration(format!(
                "server url '{}' must be http(s)",
                args.url
            )));
        }
        if args.pool == 0 {
            return Err(DroverError::Configuration(
                "pool id must be non-zero".to_string(),
            ));
        }

        let agent_name = args.name.clone().unwrap_or_else(service::host_name);

        Ok(AgentSettings {
            // Provisional identity; the server assigns the canonical id on
            // first session.
            agent_id: chrono::Utc::now().timestamp() as u64,
            agent_name,
            pool_id: args.pool,
            pool_name: None,
            server_url: args.url.trim_end_matches('/').to_string(),
            work_folder: args.work.clone(),
            signature_verification: None,
        })
    }
}

#[async_trait]
impl ConfigManager for ConfigurationManager {
    fn is_configured(&self) -> bool {
        self.store.is_configured()
    }

    fn load_settings(&self) -> Result<AgentSettings> {
        if !self.store.is_configured() {
            return Err(DroverError::NotConfigured(
                "run `drover configure` first".to_string(),
            ));
        }
        self.store.load()
    }

    async fn configure(&self, args: &ConfigureArgs) -> Result<()> {
        let settings = Self::build_settings(args)?;
        self.store.save(&settings)?;
        info!(
            "Configured agent '{}' against {} (pool {})",
            settings.agent_name, settings.server_url, settings.pool_id
        );

        if args.run_as_service {
            let unit_path = service::generate_unit(&self.root, &settings)?;
            let unit_name = service::service_name(&service::host_name(), &settings);
            self.store.save_service_marker(&unit_name)?;
            info!("Service unit generated at {}", unit_path.display());
        }

        Ok(())
    }

    async fn unconfigure(&self) -> Result<()> {
        if self.store.is_service_configured() {
            self.store.delete_service_marker()?;
            info!("Service marker removed");
        }
        self.store.delete_credentials()?;
        self.store.delete()?;
        info!("Agent configuration removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileSettingsStore;
    use tempfile::TempDir;

    fn configure_args(url: &str) -> ConfigureArgs {
        ConfigureArgs {
            url: url.to_string(),
            pool: 7,
            name: Some("build-agent-07".to_string()),
            work: PathBuf::from("_work"),
            run_as_service: false,
        }
    }

    fn manager() -> (TempDir, ConfigurationManager, Arc<FileSettingsStore>) {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(FileSettingsStore::new(temp.path()));
        let manager = ConfigurationManager::new(store.clone(), temp.path());
        (temp, manager, store)
    }

    #[tokio::test]
    async fn test_configure_persists_settings() {
        let (_temp, manager, store) = manager();
        manager
            .configure(&configure_args("https://orchestrator.example.com/"))
            .await
            .unwrap();

        assert!(manager.is_configured());
        let settings = store.load().unwrap();
        assert_eq!(settings.agent_name, "build-agent-07");
        assert_eq!(settings.pool_id, 7);
        // trailing slash is normalized away
        assert_eq!(settings.server_url, "https://orchestrator.example.com");
    }

    #[tokio::test]
    async fn test_configure_rejects_bad_url() {
        let (_temp, manager, _store) = manager();
        let err = manager
            .configure(&configure_args("ftp://nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, DroverError::Configuration(_)));
        assert!(!manager.is_configured());
    }

    #[tokio::test]
    async fn test_configure_rejects_zero_pool() {
        let (_temp, manager, _store) = manager();
        let mut args = configure_args("https://o.example.com");
        args.pool = 0;
        let err = manager.configure(&args).await.unwrap_err();
        assert!(matches!(err, DroverError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_configure_as_service_writes_unit_and_marker() {
        let (temp, manager, store) = manager();
        let mut args = configure_args("https://o.example.com");
        args.run_as_service = true;
        manager.configure(&args).await.unwrap();

        assert!(store.is_service_configured());
        let unit_written = std::fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.file_name().to_string_lossy().ends_with(".service"));
        assert!(unit_written);
    }

    #[tokio::test]
    async fn test_unconfigure_removes_everything() {
        let (_temp, manager, store) = manager();
        let mut args = configure_args("https://o.example.com");
        args.run_as_service = true;
        manager.configure(&args).await.unwrap();

        manager.unconfigure().await.unwrap();
        assert!(!store.is_configured());
        assert!(!store.is_service_configured());
    }

    #[tokio::test]
    async fn test_load_settings_before_configure_fails() {
        let (_temp, manager, _store) = manager();
        let err = manager.load_settings().unwrap_err();
        assert!(matches!(err, DroverError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_unconfigure_when_not_configured_is_ok() {
        let (_temp, manager, _store) = manager();
        manager.unconfigure().await.unwrap();
    }

    #[tokio::test]
    async fn test_reconfigure_overwrites() {
        let (_temp, manager, store) = manager();
        manager
            .configure(&configure_args("https://first.example.com"))
            .await
            .unwrap();
        manager
            .configure(&configure_args("https://second.example.com"))
            .await
            .unwrap();
        assert_eq!(store.load().unwrap().server_url, "https://second.example.com");
    }
}
