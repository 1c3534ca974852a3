//! Settings consumed by the pipeline
//!
//! Settings come from a JSON file (`.poesync.json` by default), then the
//! environment, then command line flags, each overriding the previous one.
//! Only the credential and the project id are mandatory.

use crate::error::{ServiceError, SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default settings file name
pub const SETTINGS_FILE: &str = ".poesync.json";

/// Environment variable holding the project id
pub const PROJECT_ID_ENV: &str = "POEDITOR_PROJECT_ID";

/// Table collection used when none is configured
pub const DEFAULT_COLLECTION: &str = "Strings";

/// Synchronization settings
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub api_key: Option<String>,
    pub project_id: Option<String>,
    pub table_collection: String,
    pub store_dir: PathBuf,
    pub base_url: Option<String>,
    /// Export attempts per locale; 1 disables retrying
    pub export_attempts: u32,
    pub retry_backoff_ms: u64,
    /// Yield interval of the polling driver
    pub poll_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            api_key: None,
            project_id: None,
            table_collection: DEFAULT_COLLECTION.to_string(),
            store_dir: PathBuf::from("strings"),
            base_url: None,
            export_attempts: 1,
            retry_backoff_ms: 500,
            poll_interval_ms: 100,
        }
    }
}

impl SyncConfig {
    /// Load settings from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> SyncResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                SyncError::Config(format!("Failed to parse '{}': {e}", path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(SyncError::Config(format!(
                "Failed to read '{}': {e}",
                path.display()
            ))),
        }
    }

    /// Persist settings to `path`
    pub fn save(&self, path: &Path) -> SyncResult<()> {
        let mut data = serde_json::to_vec_pretty(self)
            .map_err(|e| SyncError::Config(format!("Failed to serialize settings: {e}")))?;
        data.push(b'\n');
        std::fs::write(path, data)
            .map_err(|e| SyncError::Config(format!("Failed to write '{}': {e}", path.display())))
    }

    /// Check the preconditions for starting a run
    pub fn validate(&self) -> SyncResult<()> {
        if is_blank(&self.api_key) {
            return Err(SyncError::MissingConfig("api_key"));
        }
        if is_blank(&self.project_id) {
            return Err(SyncError::MissingConfig("project_id"));
        }
        if self.table_collection.trim().is_empty() {
            return Err(SyncError::MissingConfig("table_collection"));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.export_attempts.max(1),
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("project_id", &self.project_id)
            .field("table_collection", &self.table_collection)
            .field("store_dir", &self.store_dir)
            .field("base_url", &self.base_url)
            .field("export_attempts", &self.export_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .finish()
    }
}

/// Whether and how often a failed export is requested again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// A single attempt
    pub const NONE: RetryPolicy = RetryPolicy {
        max_attempts: 1,
        backoff: Duration::ZERO,
    };

    /// Only transport failures are retried; a logical or authorization
    /// failure would fail the same way again.
    pub fn should_retry(&self, error: &ServiceError, attempt: u32) -> bool {
        attempt < self.max_attempts && error.is_transient()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::NONE
    }
}
