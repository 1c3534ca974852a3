//! POEditor synchronization for poesync string tables
//!
//! This crate pulls every locale the host application declares from a
//! POEditor project and merges it into local string tables, one locale at a
//! time, isolating failures so a single bad locale never aborts the batch.
//!
//! # Workflow Example
//!
//! ```ignore
//! use poesync::{
//!     CollectionCatalog, Driver, Orchestrator, PoEditorClient, SyncOptions,
//! };
//! use poesync_tables::load_collection;
//! use std::path::Path;
//! use std::time::Duration;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 1. Remote service and local storage
//!     let client = PoEditorClient::from_env()?;
//!     let catalog = CollectionCatalog::new("strings".into(), "Strings");
//!     let mut strings = load_collection(Path::new("strings"), "Strings")?;
//!
//!     // 2. Build the pipeline
//!     let options = SyncOptions::new("7717")?;
//!     let orchestrator = Orchestrator::new(&client, &catalog, &mut strings, options);
//!
//!     // 3. Drive it to completion
//!     let summary = Driver::new(orchestrator)?.run_polling(Duration::from_millis(100))?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod driver;
pub mod error;
pub mod mock;
pub mod orchestrator;
pub mod outcome;
pub mod poeditor;
pub mod service;
pub mod sink;

// Re-export main types for convenient access
pub use catalog::{CollectionCatalog, LocaleCatalog, LocaleCode, StaticCatalog};
pub use config::{DEFAULT_COLLECTION, PROJECT_ID_ENV, RetryPolicy, SETTINGS_FILE, SyncConfig};
pub use driver::Driver;
pub use error::{ServiceError, ServiceResult, SyncError, SyncResult};
pub use mock::{MockCall, MockDownload, MockExport, MockService};
pub use orchestrator::{Orchestrator, SyncOptions, SyncState};
pub use outcome::{LocaleDownloadOutcome, LocaleReport, LocaleStatus, SyncSummary};
pub use poeditor::{API_KEY_ENV, PoEditorClient};
pub use service::{ExportJob, Project, TranslationService};
pub use sink::TableSink;
