use poesync_tables::TableError;
use thiserror::Error;

/// Errors raised by a remote translation service
///
/// These never escape the orchestrator: each one is turned into a failed
/// per-locale record.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Network failure or unexpected HTTP status
    #[error("transport error: {0}")]
    Transport(String),

    /// The server rejected the credential
    #[error("authorization failed: {0}")]
    Auth(String),

    /// The server answered but reported a logical failure; the server
    /// message is kept verbatim
    #[error("{0}")]
    Data(String),

    /// Writing a downloaded payload failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server answered with a body we could not understand
    #[error("unexpected response: {0}")]
    Decode(String),

    /// The service was built with an unusable configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl ServiceError {
    /// Whether the failure may go away on its own
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Transport(_))
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ServiceError::Decode(err.to_string())
        } else {
            ServiceError::Transport(err.to_string())
        }
    }
}

/// Result type for remote service calls
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors that end a synchronization run (the `Faulted` state)
#[derive(Debug, Error)]
pub enum SyncError {
    /// A required setting is absent; the run never starts
    #[error("missing required configuration: {0}")]
    MissingConfig(&'static str),

    /// A setting or settings file is unusable
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The list of locales to synchronize could not be obtained
    #[error("locale catalog unavailable: {0}")]
    Catalog(String),

    /// Local string storage rejected a write
    #[error("string table storage unavailable: {0}")]
    Store(#[from] TableError),

    /// The per-run scratch directory could not be created
    #[error("scratch directory unavailable: {0}")]
    Scratch(#[source] std::io::Error),

    /// The cooperative runtime could not be built
    #[error("async runtime unavailable: {0}")]
    Runtime(#[source] std::io::Error),

    /// A step of the pipeline panicked
    #[error("synchronization step panicked: {0}")]
    Panicked(String),

    /// The run already reached `Done` or `Faulted`
    #[error("synchronization run already finished")]
    AlreadyFinished,
}

/// Result type for synchronization runs
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_error_message_is_verbatim() {
        let err = ServiceError::Data("quota exceeded".to_string());
        assert_eq!(err.to_string(), "quota exceeded");
    }

    #[test]
    fn test_only_transport_errors_are_transient() {
        assert!(ServiceError::Transport("reset".into()).is_transient());
        assert!(!ServiceError::Data("quota exceeded".into()).is_transient());
        assert!(!ServiceError::Auth("Invalid API Token".into()).is_transient());
        assert!(!ServiceError::Decode("garbage".into()).is_transient());
    }

    #[test]
    fn test_store_error_converts() {
        let err: SyncError = TableError::Invalid("boom".to_string()).into();
        assert!(matches!(err, SyncError::Store(_)));
        assert!(err.to_string().contains("boom"));
    }
}
