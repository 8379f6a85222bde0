//! Persisted agent settings and credentials.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// How update packages are checked against the fingerprint list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMode {
    /// A mismatch fails the update
    Error,
    /// A mismatch is logged and the update proceeds
    Warning,
    /// No verification
    #[default]
    None,
}

/// Signature-verification policy persisted with the settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureVerification {
    pub mode: VerificationMode,
    #[serde(default)]
    pub fingerprints: Vec<String>,
}

/// Settings written by `configure` and read once per process start.
///
/// Persisted as a hidden UTF-8 JSON document, rewritten wholesale on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentSettings {
    pub agent_id: u64,
    pub agent_name: String,
    pub pool_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_name: Option<String>,
    pub server_url: String,
    pub work_folder: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_verification: Option<SignatureVerification>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            agent_id: 0,
            agent_name: "drover".to_string(),
            pool_id: 1,
            pool_name: None,
            server_url: String::new(),
            work_folder: PathBuf::from("_work"),
            signature_verification: None,
        }
    }
}

/// Credential material stored beside the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub scheme: String,
    #[serde(default)]
    pub data: HashMap<String, String>,
}
