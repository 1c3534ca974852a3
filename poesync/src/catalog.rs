//! Locale catalogs
//!
//! A catalog answers one question: which locales does the host application
//! declare as available, and in which order. The pipeline never invents a
//! locale code; it only mirrors what the catalog returns.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use poesync_tables::load_collection;
use std::path::PathBuf;

/// Opaque, case-sensitive locale identifier such as `en` or `pt-BR`
pub type LocaleCode = String;

/// Source of the ordered set of locales to synchronize
#[async_trait]
pub trait LocaleCatalog: Send + Sync {
    /// The available locales, in authoritative order
    ///
    /// May suspend until the host application has finished its own
    /// initialization. An error here is fatal for the whole run.
    async fn locales(&self) -> SyncResult<Vec<LocaleCode>>;
}

/// A fixed list of locales
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    locales: Vec<LocaleCode>,
}

impl StaticCatalog {
    pub fn new(locales: Vec<LocaleCode>) -> Self {
        StaticCatalog { locales }
    }
}

#[async_trait]
impl LocaleCatalog for StaticCatalog {
    async fn locales(&self) -> SyncResult<Vec<LocaleCode>> {
        Ok(self.locales.clone())
    }
}

/// Locales declared by an on-disk string table collection
///
/// Reads the collection manifest each time it is asked, so the answer
/// reflects the state of the store when the run starts.
#[derive(Debug, Clone)]
pub struct CollectionCatalog {
    store_dir: PathBuf,
    collection: String,
}

impl CollectionCatalog {
    pub fn new(store_dir: PathBuf, collection: &str) -> Self {
        CollectionCatalog {
            store_dir,
            collection: collection.to_string(),
        }
    }
}

#[async_trait]
impl LocaleCatalog for CollectionCatalog {
    async fn locales(&self) -> SyncResult<Vec<LocaleCode>> {
        let collection = load_collection(&self.store_dir, &self.collection)
            .map_err(|e| SyncError::Catalog(e.to_string()))?;
        Ok(collection.available_locales().to_vec())
    }
}
