//! Bulk synchronization pipeline
//!
//! The [`Orchestrator`] is an explicit state machine:
//!
//! ```text
//! Idle -> Initializing -> PerLocale(0..n) -> Committing -> Done
//!            \________________\________________\________-> Faulted
//! ```
//!
//! Each call to [`Orchestrator::advance`] performs exactly one transition.
//! Every locale in the catalog yields exactly one [`LocaleReport`], in
//! catalog order. Remote failures are recorded per locale and never abort
//! the batch; only an unavailable catalog or an unusable string store ends
//! the run in `Faulted`.

use crate::catalog::{LocaleCatalog, LocaleCode};
use crate::config::RetryPolicy;
use crate::error::{ServiceResult, SyncError, SyncResult};
use crate::outcome::{LocaleDownloadOutcome, LocaleReport, SyncSummary};
use crate::service::{ExportJob, TranslationService};
use crate::sink::TableSink;
use poesync_tables::read_xliff_file;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Where a run currently stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Initializing,
    /// Processing the locale at `index` out of `total`
    PerLocale {
        index: usize,
        total: usize,
        locale: LocaleCode,
    },
    Committing,
    Done,
    Faulted,
}

impl SyncState {
    /// `Done` and `Faulted` are terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncState::Done | SyncState::Faulted)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Idle => write!(f, "idle"),
            SyncState::Initializing => write!(f, "reading locale catalog"),
            SyncState::PerLocale {
                index,
                total,
                locale,
            } => write!(f, "synchronizing {locale} ({}/{total})", index + 1),
            SyncState::Committing => write!(f, "saving string tables"),
            SyncState::Done => write!(f, "done"),
            SyncState::Faulted => write!(f, "faulted"),
        }
    }
}

/// Per-run parameters of the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub project_id: String,
    pub retry: RetryPolicy,
    /// Restrict the run to these locales; empty means every catalog locale
    pub locale_filter: Vec<LocaleCode>,
}

impl SyncOptions {
    /// Fails when `project_id` is blank; such a run must never start
    pub fn new(project_id: &str) -> SyncResult<Self> {
        if project_id.trim().is_empty() {
            return Err(SyncError::MissingConfig("project_id"));
        }
        Ok(SyncOptions {
            project_id: project_id.to_string(),
            retry: RetryPolicy::default(),
            locale_filter: Vec::new(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_locale_filter(mut self, locales: Vec<LocaleCode>) -> Self {
        self.locale_filter = locales;
        self
    }
}

/// Drives one synchronization run
pub struct Orchestrator<'a> {
    service: &'a dyn TranslationService,
    catalog: &'a dyn LocaleCatalog,
    sink: &'a mut dyn TableSink,
    options: SyncOptions,
    state: SyncState,
    state_tx: watch::Sender<SyncState>,
    queue: Vec<LocaleCode>,
    reports: Vec<LocaleReport>,
    /// Per-run directory holding downloaded payloads
    scratch: Option<TempDir>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        service: &'a dyn TranslationService,
        catalog: &'a dyn LocaleCatalog,
        sink: &'a mut dyn TableSink,
        options: SyncOptions,
    ) -> Self {
        let (state_tx, _) = watch::channel(SyncState::Idle);
        Orchestrator {
            service,
            catalog,
            sink,
            options,
            state: SyncState::Idle,
            state_tx,
            queue: Vec::new(),
            reports: Vec::new(),
            scratch: None,
        }
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    /// Observe state transitions from outside the run
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state_tx.subscribe()
    }

    /// Records produced so far, in catalog order
    pub fn reports(&self) -> &[LocaleReport] {
        &self.reports
    }

    /// Directory receiving downloads; only present while the run is active
    pub fn scratch_path(&self) -> Option<&Path> {
        self.scratch.as_ref().map(TempDir::path)
    }

    /// Run every remaining transition until `Done` or `Faulted`
    pub async fn run(mut self) -> SyncResult<SyncSummary> {
        loop {
            if let Some(summary) = self.advance().await? {
                return Ok(summary);
            }
        }
    }

    /// Perform one state transition
    ///
    /// Returns the summary once the run reaches `Done`. An error moves the
    /// run to `Faulted`; advancing a finished run yields
    /// [`SyncError::AlreadyFinished`].
    pub async fn advance(&mut self) -> SyncResult<Option<SyncSummary>> {
        let result = self.step().await;
        if let Err(err) = &result
            && !matches!(err, SyncError::AlreadyFinished)
        {
            error!(error = %err, "Synchronization faulted");
            self.scratch = None;
            self.set_state(SyncState::Faulted);
        }
        result
    }

    async fn step(&mut self) -> SyncResult<Option<SyncSummary>> {
        match self.state.clone() {
            SyncState::Idle => {
                info!(
                    service = self.service.service_name(),
                    project = %self.options.project_id,
                    "Starting translation sync"
                );
                self.set_state(SyncState::Initializing);
                Ok(None)
            }
            SyncState::Initializing => {
                let locales = self.catalog.locales().await?;
                self.queue = self.select_locales(locales);
                let scratch = tempfile::Builder::new()
                    .prefix("poesync-")
                    .tempdir()
                    .map_err(SyncError::Scratch)?;
                debug!(path = %scratch.path().display(), "Created scratch directory");
                self.scratch = Some(scratch);
                info!(count = self.queue.len(), "Synchronizing locales");
                self.enter_locale(0);
                Ok(None)
            }
            SyncState::PerLocale { index, locale, .. } => {
                let report = self.process_locale(index, &locale).await?;
                self.reports.push(report);
                self.enter_locale(index + 1);
                Ok(None)
            }
            SyncState::Committing => {
                let committed_tables = self.sink.commit()?;
                if let Some(scratch) = self.scratch.take()
                    && let Err(e) = scratch.close()
                {
                    warn!(error = %e, "Failed to remove scratch directory");
                }
                let summary = SyncSummary {
                    locales: std::mem::take(&mut self.reports),
                    committed_tables,
                };
                info!(
                    succeeded = summary.succeeded(),
                    failed = summary.failed(),
                    skipped = summary.skipped(),
                    committed_tables,
                    "Translation sync finished"
                );
                self.set_state(SyncState::Done);
                Ok(Some(summary))
            }
            SyncState::Done | SyncState::Faulted => Err(SyncError::AlreadyFinished),
        }
    }

    fn set_state(&mut self, state: SyncState) {
        self.state_tx.send_replace(state.clone());
        self.state = state;
    }

    fn enter_locale(&mut self, index: usize) {
        let next = match self.queue.get(index) {
            Some(locale) => SyncState::PerLocale {
                index,
                total: self.queue.len(),
                locale: locale.clone(),
            },
            None => SyncState::Committing,
        };
        self.set_state(next);
    }

    /// Catalog order, first occurrence wins, optionally narrowed by the filter
    fn select_locales(&self, locales: Vec<LocaleCode>) -> Vec<LocaleCode> {
        let filter = &self.options.locale_filter;
        for wanted in filter {
            if !locales.contains(wanted) {
                warn!(locale = %wanted, "Requested locale is not in the catalog");
            }
        }

        let mut seen = HashSet::new();
        let mut selected = Vec::with_capacity(locales.len());
        for locale in locales {
            if !seen.insert(locale.clone()) {
                warn!(locale = %locale, "Duplicate locale in catalog, ignoring");
                continue;
            }
            if filter.is_empty() || filter.contains(&locale) {
                selected.push(locale);
            }
        }
        selected
    }

    async fn process_locale(&mut self, index: usize, locale: &str) -> SyncResult<LocaleReport> {
        let scratch = self.scratch_dir()?;
        let outcome = self.fetch(&scratch, index, locale).await;
        let report = self.merge(&outcome)?;

        if let Some(path) = outcome.temp_path()
            && let Err(e) = std::fs::remove_file(path)
        {
            warn!(locale, path = %path.display(), error = %e, "Failed to delete temporary file");
        }
        Ok(report)
    }

    fn scratch_dir(&self) -> SyncResult<PathBuf> {
        self.scratch
            .as_ref()
            .map(|dir| dir.path().to_path_buf())
            .ok_or_else(|| {
                SyncError::Scratch(std::io::Error::other("scratch directory was not created"))
            })
    }

    /// Export and download one locale
    async fn fetch(&self, scratch: &Path, index: usize, locale: &str) -> LocaleDownloadOutcome {
        let job = match self.export_with_retry(locale).await {
            Ok(job) => job,
            Err(e) => {
                error!(locale, error = %e, "Export failed");
                return LocaleDownloadOutcome::failed(locale, e.to_string());
            }
        };

        let destination = scratch.join(temp_file_name(index, locale));
        debug!(locale, url = %job.download_url, "Downloading export");
        match self
            .service
            .download_file(&job.download_url, &destination)
            .await
        {
            Ok(()) => LocaleDownloadOutcome::downloaded(locale, destination),
            Err(e) => {
                error!(locale, error = %e, "Download failed");
                if destination.exists() {
                    let _ = std::fs::remove_file(&destination);
                }
                LocaleDownloadOutcome::failed(locale, e.to_string())
            }
        }
    }

    async fn export_with_retry(&self, locale: &str) -> ServiceResult<ExportJob> {
        let retry = self.options.retry;
        let mut attempt = 1;
        loop {
            match self
                .service
                .export_locale(locale, &self.options.project_id)
                .await
            {
                Ok(job) => return Ok(job),
                Err(e) if retry.should_retry(&e, attempt) => {
                    warn!(locale, attempt, error = %e, "Export failed, retrying");
                    if !retry.backoff.is_zero() {
                        tokio::time::sleep(retry.backoff).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Parse a downloaded payload and replace the locale's entries with it
    ///
    /// Only a store failure is returned as an error.
    fn merge(&mut self, outcome: &LocaleDownloadOutcome) -> SyncResult<LocaleReport> {
        let locale = outcome.locale();
        let Some(path) = outcome.temp_path() else {
            let message = outcome.error_message().unwrap_or("unknown error");
            return Ok(LocaleReport::failed(locale, message.to_string()));
        };

        let units = match read_xliff_file(path) {
            Ok(units) => units,
            Err(e) => {
                error!(locale, error = %e, "Downloaded payload could not be parsed");
                return Ok(LocaleReport::failed(locale, e.to_string()));
            }
        };

        if !self.sink.has_table(locale) {
            warn!(locale, "No string table for locale, skipping");
            return Ok(LocaleReport::skipped(
                locale,
                format!("no string table for '{locale}'"),
            ));
        }

        let entries = self.sink.replace_entries(locale, &units)?;
        info!(locale, entries, "Imported translations");
        Ok(LocaleReport::imported(locale, entries))
    }
}

/// Unique per run; the index keeps codes that sanitize alike apart
fn temp_file_name(index: usize, locale: &str) -> String {
    let safe: String = locale
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("file-{index}-{safe}.xliff")
}
