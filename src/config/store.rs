//! Persisted settings store.
//!
//! Settings, credentials, and the service marker live as hidden dotfiles
//! under the agent root. Saves rewrite the file wholesale (delete-then-write,
//! never a partial patch); loads fail fast when the file is missing rather
//! than inventing defaults.

use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{AgentSettings, Credentials};
use crate::error::{DroverError, Result};

const SETTINGS_FILE: &str = ".agent";
const CREDENTIALS_FILE: &str = ".credentials";
const SERVICE_FILE: &str = ".service";

/// Read/write access to the agent's persisted state.
///
/// One production variant (`FileSettingsStore`); tests substitute in-memory
/// implementations.
pub trait SettingsStore: Send + Sync {
    /// True once `configure` has persisted settings
    fn is_configured(&self) -> bool;

    /// True when the agent was installed as a host-managed service
    fn is_service_configured(&self) -> bool;

    /// Load the persisted settings; fails fast when none exist
    fn load(&self) -> Result<AgentSettings>;

    /// Persist settings wholesale
    fn save(&self, settings: &AgentSettings) -> Result<()>;

    /// Delete the persisted settings, tolerating their absence
    fn delete(&self) -> Result<()>;

    /// True when credential material is stored
    fn has_credentials(&self) -> bool {
        false
    }

    /// Load stored credential material
    fn load_credentials(&self) -> Result<Credentials> {
        Err(DroverError::Settings("no credentials stored".to_string()))
    }

    /// Persist credential material wholesale
    fn save_credentials(&self, _credentials: &Credentials) -> Result<()> {
        Ok(())
    }

    /// Delete stored credential material, tolerating its absence
    fn delete_credentials(&self) -> Result<()> {
        Ok(())
    }

    /// Record the installed service unit name
    fn save_service_marker(&self, _unit_name: &str) -> Result<()> {
        Ok(())
    }

    /// Remove the service marker, tolerating its absence
    fn delete_service_marker(&self) -> Result<()> {
        Ok(())
    }
}

/// File-backed settings store rooted at the agent's config directory.
pub struct FileSettingsStore {
    root: PathBuf,
}

impl FileSettingsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default agent root: `<config dir>/drover`
    pub fn default_root() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("drover")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    fn credentials_path(&self) -> PathBuf {
        self.root.join(CREDENTIALS_FILE)
    }

    fn service_path(&self) -> PathBuf {
        self.root.join(SERVICE_FILE)
    }

    /// Delete-then-write: hidden files cannot be overwritten in place on
    /// every platform, and a wholesale rewrite keeps the document atomic
    /// with respect to partial edits.
    fn write_wholesale(path: &Path, contents: &str) -> Result<()> {
        if path.exists() {
            fs::remove_file(path)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    fn remove_if_present(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl SettingsStore for FileSettingsStore {
    fn is_configured(&self) -> bool {
        self.settings_path().exists()
    }

    fn is_service_configured(&self) -> bool {
        self.service_path().exists()
    }

    fn load(&self) -> Result<AgentSettings> {
        let path = self.settings_path();
        let json = fs::read_to_string(&path).map_err(|e| {
            DroverError::Settings(format!("cannot read {}: {e}", path.display()))
        })?;
        let settings = serde_json::from_str(&json)
            .map_err(|e| DroverError::Settings(format!("invalid {}: {e}", path.display())))?;
        Ok(settings)
    }

    fn save(&self, settings: &AgentSettings) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let json = serde_json::to_string_pretty(settings)?;
        Self::write_wholesale(&self.settings_path(), &json)?;
        info!("Settings saved to {}", self.settings_path().display());
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        Self::remove_if_present(&self.settings_path())
    }

    fn has_credentials(&self) -> bool {
        self.credentials_path().exists()
    }

    fn load_credentials(&self) -> Result<Credentials> {
        let path = self.credentials_path();
        let json = fs::read_to_string(&path).map_err(|e| {
            DroverError::Settings(format!("cannot read {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&json)
            .map_err(|e| DroverError::Settings(format!("invalid {}: {e}", path.display())))?)
    }

    fn save_credentials(&self, credentials: &Credentials) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let json = serde_json::to_string_pretty(credentials)?;
        Self::write_wholesale(&self.credentials_path(), &json)
    }

    fn delete_credentials(&self) -> Result<()> {
        Self::remove_if_present(&self.credentials_path())
    }

    fn save_service_marker(&self, unit_name: &str) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        Self::write_wholesale(&self.service_path(), unit_name)
    }

    fn delete_service_marker(&self) -> Result<()> {
        Self::remove_if_present(&self.service_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn store() -> (TempDir, FileSettingsStore) {
        let temp = TempDir::new().unwrap();
        let store = FileSettingsStore::new(temp.path());
        (temp, store)
    }

    #[test]
    fn test_unconfigured_by_default() {
        let (_temp, store) = store();
        assert!(!store.is_configured());
        assert!(!store.is_service_configured());
        assert!(!store.has_credentials());
    }

    #[test]
    fn test_load_fails_fast_when_missing() {
        let (_temp, store) = store();
        let err = store.load().unwrap_err();
        assert!(matches!(err, DroverError::Settings(_)));
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let (_temp, store) = store();
        let settings = AgentSettings {
            pool_id: 43242,
            server_url: "https://orchestrator.example.com".to_string(),
            ..AgentSettings::default()
        };
        store.save(&settings).unwrap();
        assert!(store.is_configured());
        assert_eq!(store.load().unwrap(), settings);
    }

    #[test]
    fn test_save_rewrites_wholesale() {
        let (_temp, store) = store();
        let mut settings = AgentSettings {
            pool_name: Some("default".to_string()),
            ..AgentSettings::default()
        };
        store.save(&settings).unwrap();

        settings.pool_name = None;
        settings.pool_id = 9;
        store.save(&settings).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.pool_id, 9);
        // the stale optional field must not survive the rewrite
        assert!(loaded.pool_name.is_none());
    }

    #[test]
    fn test_settings_file_is_hidden() {
        let (temp, store) = store();
        store.save(&AgentSettings::default()).unwrap();
        assert!(temp.path().join(".agent").exists());
    }

    #[test]
    fn test_delete_tolerates_absence() {
        let (_temp, store) = store();
        store.delete().unwrap();
        store.delete_credentials().unwrap();
        store.delete_service_marker().unwrap();
    }

    #[test]
    fn test_credentials_roundtrip() {
        let (_temp, store) = store();
        let mut data = HashMap::new();
        data.insert("token".to_string(), "tkn-1".to_string());
        let creds = Credentials {
            scheme: "pat".to_string(),
            data,
        };
        store.save_credentials(&creds).unwrap();
        assert!(store.has_credentials());
        assert_eq!(store.load_credentials().unwrap(), creds);

        store.delete_credentials().unwrap();
        assert!(!store.has_credentials());
    }

    #[test]
    fn test_service_marker() {
        let (_temp, store) = store();
        assert!(!store.is_service_configured());
        store
            .save_service_marker("drover.agent.host.agent.service")
            .unwrap();
        assert!(store.is_service_configured());
        store.delete_service_marker().unwrap();
        assert!(!store.is_service_configured());
    }
}
