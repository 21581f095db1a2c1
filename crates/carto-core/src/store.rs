use crate::error::StoreError;
use crate::types::{
    Edge, EdgeKind, FileRecord, Node, NodeKind, StoreStats, VectorEntry,
};

/// Persistence seam for the knowledge graph.
///
/// Implementations must flush every mutation before returning and keep the
/// per-file slice operations transactional: a reader never observes a file's
/// old and new nodes at the same time.
pub trait SymbolStore {
    // --- files ---

    fn upsert_file(&mut self, file: &FileRecord) -> Result<(), StoreError>;

    fn get_file(&self, path: &str) -> Option<FileRecord>;

    fn get_all_files(&self) -> Vec<FileRecord>;

    /// Delete a file record. Cascades to all nodes whose `file_path` equals
    /// the path, all edges sourced from it, and their vectors. Edges from
    /// other files that pointed at deleted nodes revert to unresolved.
    fn delete_file(&mut self, path: &str) -> Result<(), StoreError>;

    // --- nodes ---

    fn upsert_node(&mut self, node: &Node) -> Result<(), StoreError>;

    fn delete_nodes_by_file(&mut self, path: &str) -> Result<(), StoreError>;

    fn get_node_by_id(&self, id: &str) -> Option<Node>;

    /// Nodes in a file, ordered by `(start_line, start_col)`.
    fn get_nodes_by_file(&self, path: &str) -> Vec<Node>;

    /// Nodes of a kind, ordered by `(file_path, start_line)`.
    fn get_nodes_by_kind(&self, kind: NodeKind) -> Vec<Node>;

    /// Nodes matching a simple name, ordered by `(file_path, start_line)`.
    fn get_nodes_by_name(&self, name: &str, kind: Option<NodeKind>) -> Vec<Node>;

    // --- edges ---

    fn upsert_edge(&mut self, edge: &Edge) -> Result<(), StoreError>;

    fn delete_edges_by_file(&mut self, path: &str) -> Result<(), StoreError>;

    fn get_incoming_edges(&self, node_id: &str, kinds: Option<&[EdgeKind]>) -> Vec<Edge>;

    fn get_outgoing_edges(&self, node_id: &str, kinds: Option<&[EdgeKind]>) -> Vec<Edge>;

    /// All edges with no resolved target, ordered by `(file_path, line)`.
    fn get_unresolved_edges(&self) -> Vec<Edge>;

    /// Unresolved edges whose source node lives in one of the given files.
    fn get_unresolved_edges_in_files(&self, paths: &[String]) -> Vec<Edge>;

    /// Unresolved edges whose `target_symbol` simple name matches `name`.
    /// Used for forward discovery after a sync adds new nodes.
    fn get_unresolved_edges_by_symbol(&self, name: &str) -> Vec<Edge>;

    /// Mark one edge resolved. A single atomic update: an observer never
    /// sees a half-resolved edge.
    fn resolve_edge(
        &mut self,
        edge_id: i64,
        target_node_id: &str,
        confidence: f64,
        resolved_by: &str,
    ) -> Result<(), StoreError>;

    /// Replace a file's whole slice (file record + nodes + edges) in one
    /// transaction. Remove-phase completes before the new rows land.
    fn commit_file_slice(
        &mut self,
        file: &FileRecord,
        nodes: &[Node],
        edges: &[Edge],
    ) -> Result<(), StoreError>;

    // --- vectors ---

    fn upsert_vector(&mut self, entry: &VectorEntry) -> Result<(), StoreError>;

    /// Upsert a batch of vectors in a single transaction.
    fn upsert_vector_batch(&mut self, entries: &[VectorEntry]) -> Result<(), StoreError>;

    fn delete_vector(&mut self, node_id: &str) -> Result<(), StoreError>;

    fn get_vector(&self, node_id: &str) -> Option<VectorEntry>;

    fn get_all_vectors(&self) -> Vec<VectorEntry>;

    // --- aggregates ---

    fn stats(&self) -> StoreStats;
}
