use std::path::PathBuf;

/// Errors surfaced by the store and project-directory layer.
///
/// Per-file extraction failures are NOT errors; they are contained as
/// [`crate::types::IndexWarning`] entries in the run summary. This enum
/// covers the batch-wide failures that abort an operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("project is not initialized at {0} (no store found)")]
    NotInitialized(PathBuf),

    #[error("project is already initialized at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("store integrity: {0}")]
    Integrity(String),

    #[error("schema downgrade rejected: store is v{stored}, this build supports up to v{supported}")]
    SchemaDowngrade { stored: u32, supported: u32 },

    #[error("another writer holds the store lock at {0}")]
    LockContention(PathBuf),

    #[error("path escapes the project root: {0}")]
    PathEscape(PathBuf),

    #[error("database error: {0}")]
    Database(String),

    #[error("io error on {path}: {message}")]
    Io { path: PathBuf, message: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
