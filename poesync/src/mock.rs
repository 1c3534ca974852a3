//! Mock translation service for testing
//!
//! This module provides a deterministic, network-free [`TranslationService`]
//! for exercising the synchronization pipeline without an API key.
//!
//! Exports and downloads are scripted per locale and per URL. Anything that
//! is not scripted follows the suffix convention: the export succeeds with
//! `mock://export/<locale>` and the download yields an XLIFF file whose
//! targets are the seeded source texts with `_<locale>` appended.
//!
//! # Example
//!
//! ```ignore
//! use poesync::{MockExport, MockService, TranslationService};
//!
//! let mock = MockService::new()
//!     .with_seed_entries(vec![("hello".into(), "Hello".into())])
//!     .with_export("fr", MockExport::Fail("quota exceeded".into()));
//!
//! assert!(mock.export_locale("fr", "1").await.is_err());
//! ```

use crate::error::{ServiceError, ServiceResult};
use crate::service::{ExportJob, Project, TranslationService};
use async_trait::async_trait;
use poesync_tables::{TransUnit, write_xliff};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Scripted answer to an export request
#[derive(Debug, Clone)]
pub enum MockExport {
    /// Succeed with this download URL
    Url(String),
    /// Logical failure with this server message
    Fail(String),
    /// Network failure
    Transport(String),
    /// Credential rejected
    Auth(String),
}

/// Scripted answer to a download request
#[derive(Debug, Clone)]
pub enum MockDownload {
    /// Write this payload
    Payload(String),
    /// Network failure
    Transport(String),
}

/// A call received by the mock, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    ListProjects,
    Export { locale: String, project_id: String },
    Download { url: String },
}

/// Mock service that answers from scripts and records every call
#[derive(Debug, Default)]
pub struct MockService {
    projects: Vec<Project>,
    /// Per-locale export scripts; the last entry repeats once the others are used
    exports: Mutex<HashMap<String, VecDeque<MockExport>>>,
    downloads: HashMap<String, MockDownload>,
    seed: Vec<(String, String)>,
    /// Optional simulated network delay
    delay: Duration,
    calls: Mutex<Vec<MockCall>>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projects(mut self, projects: Vec<Project>) -> Self {
        self.projects = projects;
        self
    }

    /// Answer every export of `locale` with `export`
    pub fn with_export(self, locale: &str, export: MockExport) -> Self {
        self.with_export_sequence(locale, vec![export])
    }

    /// Answer successive exports of `locale` in order, repeating the last one
    pub fn with_export_sequence(self, locale: &str, exports: Vec<MockExport>) -> Self {
        if let Ok(mut scripts) = self.exports.lock() {
            scripts.insert(locale.to_string(), exports.into());
        }
        self
    }

    pub fn with_download(mut self, url: &str, download: MockDownload) -> Self {
        self.downloads.insert(url.to_string(), download);
        self
    }

    /// Entries (key, source text) used to build unscripted payloads
    pub fn with_seed_entries(mut self, seed: Vec<(String, String)>) -> Self {
        self.seed = seed;
        self
    }

    /// Delay every call, so each one suspends at least once
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every call received so far
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of export requests received
    pub fn export_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MockCall::Export { .. }))
            .count()
    }

    /// URL served by unscripted exports of `locale`
    pub fn default_url(locale: &str) -> String {
        format!("mock://export/{locale}")
    }

    fn record(&self, call: MockCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    async fn apply_delay(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    fn next_export(&self, locale: &str) -> MockExport {
        let Ok(mut scripts) = self.exports.lock() else {
            return MockExport::Transport("mock state poisoned".to_string());
        };
        match scripts.get_mut(locale) {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| MockExport::Url(Self::default_url(locale))),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| MockExport::Url(Self::default_url(locale))),
            None => MockExport::Url(Self::default_url(locale)),
        }
    }

    fn default_payload(&self, url: &str) -> Option<String> {
        let locale = url.strip_prefix("mock://export/")?;
        let units: Vec<TransUnit> = self
            .seed
            .iter()
            .map(|(key, source)| TransUnit {
                key: key.clone(),
                source: Some(source.clone()),
                target: Some(format!("{source}_{locale}")),
            })
            .collect();
        write_xliff("en", locale, &units).ok()
    }
}

#[async_trait]
impl TranslationService for MockService {
    async fn list_projects(&self) -> ServiceResult<Vec<Project>> {
        self.record(MockCall::ListProjects);
        self.apply_delay().await;
        Ok(self.projects.clone())
    }

    async fn export_locale(&self, locale: &str, project_id: &str) -> ServiceResult<ExportJob> {
        self.record(MockCall::Export {
            locale: locale.to_string(),
            project_id: project_id.to_string(),
        });
        self.apply_delay().await;

        match self.next_export(locale) {
            MockExport::Url(url) => Ok(ExportJob {
                locale: locale.to_string(),
                download_url: url,
            }),
            MockExport::Fail(msg) => Err(ServiceError::Data(msg)),
            MockExport::Transport(msg) => Err(ServiceError::Transport(msg)),
            MockExport::Auth(msg) => Err(ServiceError::Auth(msg)),
        }
    }

    async fn download_file(&self, url: &str, destination: &Path) -> ServiceResult<()> {
        self.record(MockCall::Download {
            url: url.to_string(),
        });
        self.apply_delay().await;

        let payload = match self.downloads.get(url) {
            Some(MockDownload::Payload(payload)) => payload.clone(),
            Some(MockDownload::Transport(msg)) => return Err(ServiceError::Transport(msg.clone())),
            None => self
                .default_payload(url)
                .ok_or_else(|| ServiceError::Transport(format!("no payload for {url}")))?,
        };

        tokio::fs::write(destination, payload).await?;
        Ok(())
    }

    fn service_name(&self) -> &str {
        "Mock Service"
    }
}
