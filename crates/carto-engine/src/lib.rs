//! Indexing pipeline, reference resolution, incremental sync, and the
//! vector index for carto.
//!
//! The [`Engine`] facade owns the project directory, the store and its
//! writer lock, the extractor, and the framework registry. Data flow:
//! files → parser pool → query engine → extractor → store → resolver →
//! store; queries go store → graph traversals or vector search.

pub mod context;
pub mod error;
pub mod indexer;
pub mod resolve;
pub mod sync;
pub mod vector;

pub use error::EngineError;
pub use indexer::Engine;
pub use resolve::{resolve_references, ResolveScope};
pub use vector::{cosine, semantic_text, Embedder, SearchHit};
