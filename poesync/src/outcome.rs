//! Per-locale records and the run summary

use crate::catalog::LocaleCode;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Result of the export and download steps for one locale
///
/// Built once per locale per run and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleDownloadOutcome {
    locale: LocaleCode,
    result: Result<PathBuf, String>,
}

impl LocaleDownloadOutcome {
    pub fn downloaded(locale: &str, path: PathBuf) -> Self {
        LocaleDownloadOutcome {
            locale: locale.to_string(),
            result: Ok(path),
        }
    }

    pub fn failed(locale: &str, message: String) -> Self {
        LocaleDownloadOutcome {
            locale: locale.to_string(),
            result: Err(message),
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Downloaded payload, set only on success
    pub fn temp_path(&self) -> Option<&Path> {
        self.result.as_ref().ok().map(PathBuf::as_path)
    }

    /// Diagnostic, set only on failure
    pub fn error_message(&self) -> Option<&str> {
        self.result.as_ref().err().map(String::as_str)
    }
}

/// Final status of one locale
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LocaleStatus {
    /// Entries were replaced with the downloaded content
    Imported { entries: usize },
    /// No local table exists for the locale; nothing was written
    Skipped { reason: String },
    /// Export, download or parsing failed; the local table was not touched
    Failed { message: String },
}

/// One line of the run summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocaleReport {
    pub locale: LocaleCode,
    #[serde(flatten)]
    pub status: LocaleStatus,
}

impl LocaleReport {
    pub fn imported(locale: &str, entries: usize) -> Self {
        Self::new(locale, LocaleStatus::Imported { entries })
    }

    pub fn skipped(locale: &str, reason: String) -> Self {
        Self::new(locale, LocaleStatus::Skipped { reason })
    }

    pub fn failed(locale: &str, message: String) -> Self {
        Self::new(locale, LocaleStatus::Failed { message })
    }

    fn new(locale: &str, status: LocaleStatus) -> Self {
        LocaleReport {
            locale: locale.to_string(),
            status,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, LocaleStatus::Imported { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, LocaleStatus::Failed { .. })
    }

    pub fn is_skip(&self) -> bool {
        matches!(self.status, LocaleStatus::Skipped { .. })
    }
}

impl fmt::Display for LocaleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            LocaleStatus::Imported { entries } => {
                write!(f, "{:<8} ok       {entries} entries", self.locale)
            }
            LocaleStatus::Skipped { reason } => write!(f, "{:<8} skipped  {reason}", self.locale),
            LocaleStatus::Failed { message } => write!(f, "{:<8} FAILED   {message}", self.locale),
        }
    }
}

/// Aggregate of one synchronization run, in catalog order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub locales: Vec<LocaleReport>,
    /// Tables written by the commit step
    pub committed_tables: usize,
}

impl SyncSummary {
    pub fn succeeded(&self) -> usize {
        self.locales.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.locales.iter().filter(|r| r.is_failure()).count()
    }

    pub fn skipped(&self) -> usize {
        self.locales.iter().filter(|r| r.is_skip()).count()
    }

    pub fn report(&self, locale: &str) -> Option<&LocaleReport> {
        self.locales.iter().find(|r| r.locale == locale)
    }

    /// True when no locale failed
    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.locales {
            writeln!(f, "{report}")?;
        }
        write!(
            f,
            "{} imported, {} failed, {} skipped",
            self.succeeded(),
            self.failed(),
            self.skipped()
        )
    }
}
