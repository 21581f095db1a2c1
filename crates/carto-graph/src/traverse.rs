use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use carto_core::store::SymbolStore;
use carto_core::types::{Edge, EdgeKind, Node, NodeKind};

/// Edge kinds that propagate impact: a change to a node can affect anything
/// reaching it through these.
const IMPACT_KINDS: &[EdgeKind] = &[
    EdgeKind::Calls,
    EdgeKind::Imports,
    EdgeKind::Extends,
    EdgeKind::Implements,
];

/// A node in an impact set, annotated with its minimum distance from the
/// focal node.
#[derive(Debug, Clone, Serialize)]
pub struct ImpactedNode {
    pub node: Node,
    pub depth: u32,
}

/// Context assembled around one focal node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeContext {
    pub node: Node,
    /// `contains` chain, nearest enclosing scope first, ending at the file.
    pub ancestors: Vec<Node>,
    pub children: Vec<Node>,
    /// Incoming references, `contains` excluded.
    pub incoming: Vec<Edge>,
    /// Outgoing references, `contains` excluded.
    pub outgoing: Vec<Edge>,
    /// Import edges of the enclosing file.
    pub file_imports: Vec<Edge>,
}

/// Read-only traversal facade over a store.
pub struct Graph<'a> {
    store: &'a dyn SymbolStore,
}

impl<'a> Graph<'a> {
    pub fn new(store: &'a dyn SymbolStore) -> Self {
        Self { store }
    }

    /// Walk `contains` edges upward until the file node. Nearest first.
    pub fn get_ancestors(&self, node_id: &str) -> Vec<Node> {
        let mut ancestors = Vec::new();
        let mut current = node_id.to_string();
        let mut guard = HashSet::new();
        guard.insert(current.clone());

        loop {
            let parents = self
                .store
                .get_incoming_edges(&current, Some(&[EdgeKind::Contains]));
            let Some(parent_edge) = parents.first() else {
                break;
            };
            let Some(parent) = self.store.get_node_by_id(&parent_edge.source_id) else {
                break;
            };
            // contains is a forest by invariant; the guard keeps a corrupted
            // store from looping us forever.
            if !guard.insert(parent.id.clone()) {
                break;
            }
            current = parent.id.clone();
            let is_file = parent.kind == NodeKind::File;
            ancestors.push(parent);
            if is_file {
                break;
            }
        }
        ancestors
    }

    /// Immediate `contains` targets, sorted by `(file_path, start_line)`.
    pub fn get_children(&self, node_id: &str) -> Vec<Node> {
        let mut children: Vec<Node> = self
            .store
            .get_outgoing_edges(node_id, Some(&[EdgeKind::Contains]))
            .iter()
            .filter_map(|e| e.target_id.as_deref())
            .filter_map(|id| self.store.get_node_by_id(id))
            .collect();
        children.sort_by(|a, b| {
            (a.file_path.as_str(), a.range.start_line).cmp(&(b.file_path.as_str(), b.range.start_line))
        });
        children
    }

    /// Bounded reverse-reachability: everything within `depth` hops of the
    /// focal node over incoming call/import/inherit edges. Each node appears
    /// once, at its minimum depth; depth 0 is the focal node itself.
    pub fn impact_radius(&self, node_id: &str, depth: u32) -> Vec<ImpactedNode> {
        let Some(focal) = self.store.get_node_by_id(node_id) else {
            return Vec::new();
        };

        let mut best: HashMap<String, u32> = HashMap::new();
        best.insert(focal.id.clone(), 0);
        let mut queue = VecDeque::new();
        queue.push_back((focal.id.clone(), 0u32));

        while let Some((id, d)) = queue.pop_front() {
            if d >= depth {
                continue;
            }
            for edge in self.store.get_incoming_edges(&id, Some(IMPACT_KINDS)) {
                let source = edge.source_id.clone();
                if best.contains_key(&source) {
                    continue;
                }
                best.insert(source.clone(), d + 1);
                queue.push_back((source, d + 1));
            }
        }

        let mut result: Vec<ImpactedNode> = best
            .into_iter()
            .filter_map(|(id, d)| {
                self.store
                    .get_node_by_id(&id)
                    .map(|node| ImpactedNode { node, depth: d })
            })
            .collect();
        result.sort_by(|a, b| {
            (a.depth, a.node.file_path.as_str(), a.node.range.start_line).cmp(&(
                b.depth,
                b.node.file_path.as_str(),
                b.node.range.start_line,
            ))
        });
        result
    }

    /// Nodes calling the given node, one hop.
    pub fn get_callers(&self, node_id: &str) -> Vec<Node> {
        let mut callers: Vec<Node> = self
            .store
            .get_incoming_edges(node_id, Some(&[EdgeKind::Calls]))
            .iter()
            .filter_map(|e| self.store.get_node_by_id(&e.source_id))
            .collect();
        callers.sort_by(|a, b| {
            (a.file_path.as_str(), a.range.start_line).cmp(&(b.file_path.as_str(), b.range.start_line))
        });
        callers.dedup_by(|a, b| a.id == b.id);
        callers
    }

    /// Nodes the given node calls, one hop. Unresolved call edges are not
    /// included; their `target_symbol` is still visible on the edge list.
    pub fn get_callees(&self, node_id: &str) -> Vec<Node> {
        let mut callees: Vec<Node> = self
            .store
            .get_outgoing_edges(node_id, Some(&[EdgeKind::Calls]))
            .iter()
            .filter_map(|e| e.target_id.as_deref())
            .filter_map(|id| self.store.get_node_by_id(id))
            .collect();
        callees.sort_by(|a, b| {
            (a.file_path.as_str(), a.range.start_line).cmp(&(b.file_path.as_str(), b.range.start_line))
        });
        callees.dedup_by(|a, b| a.id == b.id);
        callees
    }

    /// DFS with a recursion stack over file-level imports. Every back edge
    /// emits its cycle slice; cycles sharing nodes are reported separately.
    /// Cycle entries are file paths; every cycle has length >= 2.
    pub fn find_circular_dependencies(&self) -> Vec<Vec<String>> {
        let files = self.store.get_nodes_by_kind(NodeKind::File);
        let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
        let id_to_path: HashMap<String, String> = files
            .iter()
            .map(|f| (f.id.clone(), f.file_path.clone()))
            .collect();

        for file in &files {
            let mut targets: Vec<String> = self
                .store
                .get_outgoing_edges(&file.id, Some(&[EdgeKind::Imports]))
                .iter()
                .filter_map(|e| e.target_id.clone())
                .filter(|id| id_to_path.contains_key(id) && id != &file.id)
                .collect();
            targets.sort();
            targets.dedup();
            adjacency.insert(file.id.clone(), targets);
        }

        let mut cycles = Vec::new();
        let mut seen_cycles = HashSet::new();
        let mut visited: HashSet<String> = HashSet::new();

        for file in &files {
            let mut stack: Vec<String> = Vec::new();
            let mut on_stack: HashSet<String> = HashSet::new();
            self.dfs_cycles(
                &file.id,
                &adjacency,
                &id_to_path,
                &mut visited,
                &mut stack,
                &mut on_stack,
                &mut cycles,
                &mut seen_cycles,
            );
        }
        cycles
    }

    #[allow(clippy::too_many_arguments)]
    fn dfs_cycles(
        &self,
        id: &str,
        adjacency: &HashMap<String, Vec<String>>,
        id_to_path: &HashMap<String, String>,
        visited: &mut HashSet<String>,
        stack: &mut Vec<String>,
        on_stack: &mut HashSet<String>,
        cycles: &mut Vec<Vec<String>>,
        seen_cycles: &mut HashSet<Vec<String>>,
    ) {
        stack.push(id.to_string());
        on_stack.insert(id.to_string());

        for next in adjacency.get(id).map(Vec::as_slice).unwrap_or(&[]) {
            if on_stack.contains(next) {
                // Back edge: the cycle is the stack slice from the target.
                let pos = stack.iter().position(|s| s == next).unwrap_or(0);
                let slice: Vec<String> = stack[pos..]
                    .iter()
                    .filter_map(|nid| id_to_path.get(nid).cloned())
                    .collect();
                if slice.len() >= 2 {
                    let normalized = normalize_cycle(&slice);
                    if seen_cycles.insert(normalized.clone()) {
                        cycles.push(normalized);
                    }
                }
            } else if !visited.contains(next) {
                self.dfs_cycles(
                    next, adjacency, id_to_path, visited, stack, on_stack, cycles, seen_cycles,
                );
            }
        }

        on_stack.remove(id);
        stack.pop();
        visited.insert(id.to_string());
    }

    /// Assemble the focal node with its surroundings: ancestors, children,
    /// filtered references, and the enclosing file's imports.
    pub fn get_context(&self, node_id: &str) -> Option<NodeContext> {
        let node = self.store.get_node_by_id(node_id)?;
        let ancestors = self.get_ancestors(node_id);
        let children = self.get_children(node_id);

        let not_contains = |e: &Edge| e.kind != EdgeKind::Contains;
        let incoming: Vec<Edge> = self
            .store
            .get_incoming_edges(node_id, None)
            .into_iter()
            .filter(not_contains)
            .collect();
        let outgoing: Vec<Edge> = self
            .store
            .get_outgoing_edges(node_id, None)
            .into_iter()
            .filter(not_contains)
            .collect();

        let file_node = if node.kind == NodeKind::File {
            Some(&node)
        } else {
            ancestors.iter().find(|a| a.kind == NodeKind::File)
        };
        let file_imports = file_node
            .map(|f| self.store.get_outgoing_edges(&f.id, Some(&[EdgeKind::Imports])))
            .unwrap_or_default();

        Some(NodeContext {
            node,
            ancestors,
            children,
            incoming,
            outgoing,
            file_imports,
        })
    }
}

/// Rotate a cycle so it starts at its lexicographically smallest member,
/// making equal cycles comparable regardless of DFS entry point.
fn normalize_cycle(cycle: &[String]) -> Vec<String> {
    let Some(min_pos) = cycle
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)
    else {
        return cycle.to_vec();
    };
    let mut rotated = Vec::with_capacity(cycle.len());
    rotated.extend_from_slice(&cycle[min_pos..]);
    rotated.extend_from_slice(&cycle[..min_pos]);
    rotated
}
