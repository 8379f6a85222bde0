//! Runtime metadata published by the loop and read by job executions.
//!
//! Single writer (the loop task), many readers (executor tasks). Readers
//! take a snapshot at job start; updates affect jobs started afterward.

use std::sync::RwLock;
use std::time::Duration;

use crate::domain::MetadataMessage;

/// Runtime-tunable values consulted by job executions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeMetadata {
    /// How often job output is flushed to the server
    pub log_flush_interval: Duration,
}

impl Default for RuntimeMetadata {
    fn default() -> Self {
        Self {
            log_flush_interval: Duration::from_millis(1000),
        }
    }
}

/// Shared cell holding the current runtime metadata.
pub struct MetadataCell {
    inner: RwLock<RuntimeMetadata>,
}

impl MetadataCell {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RuntimeMetadata::default()),
        }
    }

    /// Apply a metadata update. Called only from the loop task.
    pub fn apply(&self, update: &MetadataMessage) {
        if let Some(millis) = update.post_lines_frequency_millis {
            let mut metadata = match self.inner.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            metadata.log_flush_interval = Duration::from_millis(millis);
        }
    }

    /// Snapshot the current values for a job about to start.
    pub fn snapshot(&self) -> RuntimeMetadata {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Default for MetadataCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flush_interval() {
        let cell = MetadataCell::new();
        assert_eq!(
            cell.snapshot().log_flush_interval,
            Duration::from_millis(1000)
        );
    }

    #[test]
    fn test_apply_updates_snapshot() {
        let cell = MetadataCell::new();
        cell.apply(&MetadataMessage {
            post_lines_frequency_millis: Some(500),
        });
        assert_eq!(
            cell.snapshot().log_flush_interval,
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_empty_update_is_noop() {
        let cell = MetadataCell::new();
        let before = cell.snapshot();
        cell.apply(&MetadataMessage::default());
        assert_eq!(cell.snapshot(), before);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let cell = MetadataCell::new();
        let snapshot = cell.snapshot();
        cell.apply(&MetadataMessage {
            post_lines_frequency_millis: Some(250),
        });
        // the earlier snapshot keeps the values from its moment in time
        assert_eq!(snapshot.log_flush_interval, Duration::from_millis(1000));
    }
}
