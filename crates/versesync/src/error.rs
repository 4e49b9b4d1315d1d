use thiserror::Error;

type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Not connected to a sync backend, please connect first")]
    NotAuthenticated,

    #[error("No sync backend selected")]
    NoAdapterSelected,

    #[error("Unknown sync backend: {0}")]
    UnknownAdapter(String),

    #[error("Sync backend already registered: {0}")]
    DuplicateAdapter(String),

    #[error("{adapter} error: {message}")]
    Backend {
        adapter: String,
        message: String,
        #[source]
        source: Option<BoxedCause>,
    },

    #[error("Remote data on {adapter} changed during sync, run sync again")]
    RemoteChanged { adapter: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn backend(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::Backend {
            adapter: adapter.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Wraps a transport failure, keeping the original error as the source.
    pub fn backend_with<E>(adapter: impl Into<String>, message: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        SyncError::Backend {
            adapter: adapter.into(),
            message: message.into(),
            source: Some(Box::new(cause)),
        }
    }

    /// Configuration and programming mistakes: retrying will not help.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::NoAdapterSelected
                | SyncError::UnknownAdapter(_)
                | SyncError::DuplicateAdapter(_)
                | SyncError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
