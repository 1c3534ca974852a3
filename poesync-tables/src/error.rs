use std::path::PathBuf;

use thiserror::Error;

/// Error types for local string storage
#[derive(Debug, Error)]
pub enum TableError {
    /// Filesystem failure while reading or writing a table
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A table or manifest file holds invalid JSON
    #[error("Failed to parse JSON from '{}': {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The interchange payload could not be read
    #[error("Invalid XLIFF: {0}")]
    Xliff(String),

    /// No collection exists at the expected location
    #[error("String table collection '{name}' not found at '{}'", .path.display())]
    CollectionNotFound { name: String, path: PathBuf },

    /// Invalid table content
    #[error("{0}")]
    Invalid(String),
}

impl TableError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TableError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        TableError::Json {
            path: path.into(),
            source,
        }
    }
}

/// Result type for table operations
pub type TableResult<T> = Result<T, TableError>;
