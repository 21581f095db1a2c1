use carto_core::error::StoreError;
use carto_parsers::error::ParseError;

/// Batch-wide engine failures. Per-file problems never appear here; they
/// are contained as warnings in the run summaries.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("embeddings are unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("vector dimensions differ: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("io error on {path}: {message}")]
    Io { path: String, message: String },
}
