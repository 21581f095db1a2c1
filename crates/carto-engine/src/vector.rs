//! Vector index: embedding storage and brute-force cosine search.
//!
//! The embedding model itself is external, behind the [`Embedder`] contract;
//! the index stores whatever vectors the model produced and never touches
//! the network.

use serde::Serialize;

use carto_core::store::SymbolStore;
use carto_core::types::{Node, VectorEntry};

use crate::error::EngineError;

/// Contract for the external embedding model.
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError>;
}

/// One semantic search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub node_id: String,
    pub score: f32,
    pub model: String,
}

/// Cosine similarity: dot(a,b) / (||a||·||b||). Zero vectors score 0;
/// mixed dimensions are rejected.
pub fn cosine(a: &[f32], b: &[f32]) -> Result<f32, EngineError> {
    if a.len() != b.len() {
        return Err(EngineError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (mag_a * mag_b))
}

/// The text a node is embedded from: labeled attribute lines, so the model
/// sees kind and location context alongside the identifier.
pub fn semantic_text(node: &Node) -> String {
    let mut lines = vec![
        format!("kind: {}", node.kind),
        format!("name: {}", node.name),
        format!("qualified: {}", node.qualified_name),
        format!("file: {}", node.file_path),
    ];
    if let Some(signature) = &node.signature {
        lines.push(format!("signature: {signature}"));
    }
    if let Some(doc) = &node.docstring {
        lines.push(format!("doc: {doc}"));
    }
    lines.join("\n")
}

/// Upsert one vector. A model different from what the index already holds
/// is allowed but flagged.
pub fn store_vector(
    store: &mut dyn SymbolStore,
    node_id: &str,
    embedding: Vec<f32>,
    model: &str,
) -> Result<(), EngineError> {
    flag_model_mismatch(store, model);
    store.upsert_vector(&VectorEntry {
        node_id: node_id.to_string(),
        embedding,
        model: model.to_string(),
    })?;
    Ok(())
}

/// Upsert a batch in a single transaction.
pub fn store_vector_batch(
    store: &mut dyn SymbolStore,
    entries: &[VectorEntry],
) -> Result<(), EngineError> {
    if let Some(first) = entries.first() {
        flag_model_mismatch(store, &first.model);
    }
    store.upsert_vector_batch(entries)?;
    Ok(())
}

pub fn delete_vector(store: &mut dyn SymbolStore, node_id: &str) -> Result<(), EngineError> {
    store.delete_vector(node_id)?;
    Ok(())
}

fn flag_model_mismatch(store: &dyn SymbolStore, model: &str) {
    if let Some(existing) = store.get_all_vectors().first() {
        if existing.model != model {
            tracing::warn!(
                existing = %existing.model,
                incoming = %model,
                "vector index now holds embeddings from multiple models"
            );
        }
    }
}

/// Brute-force cosine search over every stored vector, descending by score,
/// filtered by `min_score`.
pub fn search(
    store: &dyn SymbolStore,
    query: &[f32],
    limit: usize,
    min_score: f32,
) -> Result<Vec<SearchHit>, EngineError> {
    let mut hits = Vec::new();
    for entry in store.get_all_vectors() {
        let score = cosine(query, &entry.embedding)?;
        if score >= min_score {
            hits.push(SearchHit {
                node_id: entry.node_id,
                score,
                model: entry.model,
            });
        }
    }
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.node_id.cmp(&b.node_id))
    });
    hits.truncate(limit);
    Ok(hits)
}
