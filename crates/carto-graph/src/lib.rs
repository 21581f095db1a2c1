//! Traversals and derived queries over the knowledge graph.
//!
//! All traversal runs against the store through IDs; there is no in-memory
//! owning graph, so the naturally-cyclic edge set (mutual calls, mutual
//! imports) needs no special topology handling. Orderings are stable:
//! siblings sort by `(file_path, start_line)`.

mod traverse;

pub use traverse::{Graph, ImpactedNode, NodeContext};
