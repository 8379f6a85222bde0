//! Configuration layer: persisted settings store, configure/remove manager,
//! and the runtime-metadata cell shared with job executions.

pub mod manager;
pub mod metadata;
pub mod store;

pub use manager::{ConfigManager, ConfigurationManager};
pub use metadata::{MetadataCell, RuntimeMetadata};
pub use store::{FileSettingsStore, SettingsStore};
