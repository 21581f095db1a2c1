//! Extractor: translates raw query captures into typed nodes, structural
//! edges, and unresolved references with deterministic IDs.

pub mod scope;

use std::collections::{HashMap, HashSet};

use carto_core::ids::node_id;
use carto_core::types::{Edge, EdgeKind, Node, NodeKind, RefKind, SourceRange, UnresolvedRef};

use crate::engine::{run_queries, MatchCaptures};
use crate::error::ParseError;
use crate::language::Language;
use crate::pool::ParserPool;

/// Pass name recorded on edges that never needed the resolver.
pub const RESOLVED_BY_SYNTAX: &str = "syntax";

/// Everything extracted from one file. The file node is always
/// `nodes[0]`.
#[derive(Debug, Default)]
pub struct FileExtraction {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub refs: Vec<UnresolvedRef>,
    /// Tree-sitter reported an error tree; whatever did extract is kept.
    pub had_errors: bool,
}

/// Raw definition assembled from one query match, before scope analysis.
struct RawDef {
    kind: NodeKind,
    name: String,
    range: SourceRange,
    params: Option<String>,
    receiver: Option<String>,
}

/// Raw reference assembled from one query match.
struct RawRef {
    kind: RefKind,
    name: String,
    qualifier: Option<String>,
    range: SourceRange,
}

pub struct Extractor {
    pool: ParserPool,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    pub fn new() -> Self {
        Self {
            pool: ParserPool::new(),
        }
    }

    pub fn pool(&self) -> &ParserPool {
        &self.pool
    }

    /// Extract one file. Parse errors are not fatal: the tree-sitter error
    /// tree still yields every match outside the broken region, and
    /// `had_errors` tells the caller to record a warning.
    pub fn extract(
        &self,
        rel_path: &str,
        content: &[u8],
        language: Language,
    ) -> Result<FileExtraction, ParseError> {
        let tree = self.pool.parse(content, language)?;
        let had_errors = tree.root_node().has_error();
        let matches = run_queries(&tree, content, language)?;

        let line_count = content.iter().filter(|b| **b == b'\n').count() as u32 + 1;
        let file_node = Node {
            id: node_id(NodeKind::File, rel_path, rel_path, 1),
            kind: NodeKind::File,
            name: rel_path.to_string(),
            qualified_name: rel_path.to_string(),
            language: language.tag().to_string(),
            file_path: rel_path.to_string(),
            range: SourceRange {
                start_line: 1,
                start_col: 0,
                end_line: line_count,
                end_col: 0,
            },
            signature: None,
            docstring: None,
            is_exported: true,
            updated_at: 0,
        };

        let mut raw_defs = Vec::new();
        let mut raw_refs = Vec::new();
        for m in &matches {
            if let Some(def) = read_def(m) {
                raw_defs.push(def);
            }
            raw_refs.extend(read_refs(m, language));
        }

        let sep = language.separator();
        let mut nodes: Vec<Node> = Vec::new();
        for def in dedup_defs(raw_defs) {
            let (scopes, innermost) =
                scope::enclosing_scopes(&tree, content, language, def.range);

            let mut kind = def.kind;
            if kind == NodeKind::Function
                && innermost.is_some_and(|k| scope::is_class_like_scope(language, k))
            {
                kind = NodeKind::Method;
            }
            kind = classify_special(language, kind, &def.name);

            let qualified = match &def.receiver {
                // Go methods inherit the receiver type as their prefix.
                Some(recv) => {
                    let recv = recv.trim_start_matches('*').trim();
                    format!("{recv}{sep}{}", def.name)
                }
                None if scopes.is_empty() => def.name.clone(),
                None => format!("{}{sep}{}", scopes.join(sep), def.name),
            };

            let signature = def.params.as_ref().map(|p| {
                let p: String = p.split_whitespace().collect::<Vec<_>>().join(" ");
                format!("{}{p}", def.name)
            });

            nodes.push(Node {
                id: node_id(kind, rel_path, &qualified, def.range.start_line),
                kind,
                name: def.name.clone(),
                qualified_name: qualified,
                language: language.tag().to_string(),
                file_path: rel_path.to_string(),
                range: def.range,
                signature,
                docstring: scope::docstring(&tree, content, language, def.range),
                is_exported: scope::is_exported(&tree, content, language, def.range, &def.name),
                updated_at: 0,
            });
        }

        // Two patterns can land on the same identity (e.g. a decorated and a
        // plain match); the deterministic ID makes the duplicate visible.
        let mut seen = HashSet::new();
        nodes.retain(|n| seen.insert(n.id.clone()));

        let mut edges = contains_edges(&file_node, &nodes, rel_path);
        let mut refs = Vec::new();
        for raw in dedup_refs(raw_refs) {
            let source_id = match raw.kind {
                // Import edges belong to the file.
                RefKind::Import => file_node.id.clone(),
                _ => innermost_node_at(&nodes, raw.range.start_line)
                    .map(|n| n.id.clone())
                    .unwrap_or_else(|| file_node.id.clone()),
            };

            // Intra-file inheritance is visible from syntax alone.
            if matches!(raw.kind, RefKind::Extends | RefKind::Implements) {
                if let Some(target) = nodes
                    .iter()
                    .find(|n| n.name == raw.name && is_type_kind(n.kind))
                {
                    edges.push(Edge {
                        id: 0,
                        source_id,
                        target_id: Some(target.id.clone()),
                        target_symbol: raw.name.clone(),
                        qualifier: raw.qualifier.clone(),
                        kind: raw.kind.edge_kind(),
                        file_path: rel_path.to_string(),
                        line: raw.range.start_line,
                        col: raw.range.start_col,
                        confidence: 1.0,
                        resolved_by: Some(RESOLVED_BY_SYNTAX.to_string()),
                    });
                    continue;
                }
            }

            refs.push(UnresolvedRef {
                source_node_id: source_id,
                name: raw.name,
                qualifier: raw.qualifier,
                kind: raw.kind,
                file_path: rel_path.to_string(),
                line: raw.range.start_line,
                col: raw.range.start_col,
            });
        }

        let mut all_nodes = Vec::with_capacity(nodes.len() + 1);
        all_nodes.push(file_node);
        all_nodes.extend(nodes);

        Ok(FileExtraction {
            nodes: all_nodes,
            edges,
            refs,
            had_errors,
        })
    }
}

fn def_kind(kind: &str) -> Option<NodeKind> {
    match kind {
        "function" => Some(NodeKind::Function),
        "method" => Some(NodeKind::Method),
        "class" => Some(NodeKind::Class),
        "struct" => Some(NodeKind::Struct),
        "interface" => Some(NodeKind::Interface),
        "trait" => Some(NodeKind::Trait),
        "enum" => Some(NodeKind::Enum),
        "module" => Some(NodeKind::Module),
        "constant" => Some(NodeKind::Constant),
        "variable" => Some(NodeKind::Variable),
        "type_alias" => Some(NodeKind::TypeAlias),
        "field" => Some(NodeKind::Field),
        "property" => Some(NodeKind::Property),
        "constructor" => Some(NodeKind::Constructor),
        _ => None,
    }
}

fn read_def(m: &MatchCaptures) -> Option<RawDef> {
    let whole = m.captures.iter().find(|c| {
        c.name.starts_with("def.") && c.name.matches('.').count() == 1
    })?;
    let kind_str = whole.name.strip_prefix("def.")?;
    let kind = def_kind(kind_str)?;
    let name = m.get(&format!("def.{kind_str}.name"))?.text.clone();
    Some(RawDef {
        kind,
        name,
        range: whole.range,
        params: m.get(&format!("def.{kind_str}.params")).map(|c| c.text.clone()),
        receiver: m.get("def.method.receiver").map(|c| c.text.clone()),
    })
}

fn trim_specifier(raw: &str) -> String {
    raw.trim_matches(|c| c == '"' || c == '\'' || c == '`' || c == '<' || c == '>')
        .to_string()
}

fn read_refs(m: &MatchCaptures, language: Language) -> Vec<RawRef> {
    let mut out = Vec::new();

    if let Some(call) = m.get("ref.call") {
        if let Some(name) = m.get("ref.call.name") {
            // Ruby requires are imports, captured separately.
            let is_ruby_require = language == Language::Ruby
                && matches!(name.text.as_str(), "require" | "require_relative");
            if !is_ruby_require {
                out.push(RawRef {
                    kind: RefKind::Call,
                    name: name.text.clone(),
                    qualifier: m.get("ref.call.receiver").map(|c| c.text.clone()),
                    range: call.range,
                });
            }
        }
    }

    if let Some(import) = m.get("ref.import") {
        if let Some(source) = m.get("ref.import.source") {
            let keep = match m.get("ref.import.fn") {
                Some(f) => matches!(f.text.as_str(), "require" | "require_relative"),
                None => true,
            };
            if keep {
                let specifier = trim_specifier(&source.text);
                match m.get("ref.import.name") {
                    // Per-symbol import: the specifier becomes the qualifier.
                    Some(symbol) => out.push(RawRef {
                        kind: RefKind::Import,
                        name: symbol.text.clone(),
                        qualifier: Some(specifier),
                        range: import.range,
                    }),
                    None => out.push(RawRef {
                        kind: RefKind::Import,
                        name: specifier,
                        qualifier: None,
                        range: import.range,
                    }),
                }
            }
        }
    }

    if let Some(ext) = m.get("ref.extends") {
        if let Some(name) = m.get("ref.extends.name") {
            out.push(RawRef {
                kind: RefKind::Extends,
                name: name.text.clone(),
                qualifier: None,
                range: ext.range,
            });
        }
    }

    if let Some(imp) = m.get("ref.implements") {
        if let Some(name) = m.get("ref.implements.name") {
            out.push(RawRef {
                kind: RefKind::Implements,
                name: name.text.clone(),
                qualifier: None,
                range: imp.range,
            });
        }
    }

    out
}

/// Rank used when two patterns claim the same (name, line): the generic
/// variable/alias patterns lose to the specific ones.
fn kind_rank(kind: NodeKind) -> u8 {
    match kind {
        NodeKind::Variable => 0,
        NodeKind::TypeAlias => 1,
        _ => 2,
    }
}

fn dedup_defs(defs: Vec<RawDef>) -> Vec<RawDef> {
    let mut by_key: HashMap<(String, u32), usize> = HashMap::new();
    let mut out: Vec<RawDef> = Vec::new();
    for def in defs {
        let key = (def.name.clone(), def.range.start_line);
        match by_key.get(&key).copied() {
            Some(i) => {
                if kind_rank(def.kind) > kind_rank(out[i].kind) {
                    out[i] = def;
                }
            }
            None => {
                by_key.insert(key, out.len());
                out.push(def);
            }
        }
    }
    out
}

fn dedup_refs(refs: Vec<RawRef>) -> Vec<RawRef> {
    let mut seen = HashSet::new();
    refs.into_iter()
        .filter(|r| {
            seen.insert((
                r.kind.edge_kind(),
                r.name.clone(),
                r.qualifier.clone(),
                r.range.start_line,
                r.range.start_col,
            ))
        })
        .collect()
}

fn classify_special(language: Language, kind: NodeKind, name: &str) -> NodeKind {
    match (language, kind) {
        (
            Language::TypeScript | Language::Tsx | Language::JavaScript,
            NodeKind::Method,
        ) if name == "constructor" => NodeKind::Constructor,
        (Language::Python, NodeKind::Method) if name == "__init__" => NodeKind::Constructor,
        (Language::Python, NodeKind::Method) if name == "__del__" => NodeKind::Destructor,
        (Language::Ruby, NodeKind::Method) if name == "initialize" => NodeKind::Constructor,
        _ => kind,
    }
}

fn is_type_kind(kind: NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Class
            | NodeKind::Struct
            | NodeKind::Interface
            | NodeKind::Trait
            | NodeKind::Enum
    )
}

/// Smallest extracted definition whose range covers the line.
fn innermost_node_at(nodes: &[Node], line: u32) -> Option<&Node> {
    nodes
        .iter()
        .filter(|n| n.range.start_line <= line && line <= n.range.end_line)
        .min_by_key(|n| n.range.end_line - n.range.start_line)
}

/// Each non-file node gets exactly one `contains` parent: the node whose
/// qualified name is its prefix, or the file node.
fn contains_edges(file_node: &Node, nodes: &[Node], rel_path: &str) -> Vec<Edge> {
    let mut by_qualified: HashMap<&str, Vec<&Node>> = HashMap::new();
    for node in nodes {
        by_qualified.entry(&node.qualified_name).or_default().push(node);
    }

    let mut edges = Vec::new();
    for node in nodes {
        let parent_id = parent_prefix(&node.qualified_name)
            .and_then(|prefix| {
                let candidates = by_qualified.get(prefix)?;
                candidates
                    .iter()
                    .find(|c| {
                        c.id != node.id
                            && c.range.start_line <= node.range.start_line
                            && node.range.start_line <= c.range.end_line
                    })
                    .or_else(|| candidates.iter().find(|c| c.id != node.id))
                    .map(|c| c.id.clone())
            })
            .unwrap_or_else(|| file_node.id.clone());

        edges.push(Edge {
            id: 0,
            source_id: parent_id,
            target_id: Some(node.id.clone()),
            target_symbol: node.qualified_name.clone(),
            qualifier: None,
            kind: EdgeKind::Contains,
            file_path: rel_path.to_string(),
            line: node.range.start_line,
            col: node.range.start_col,
            confidence: 1.0,
            resolved_by: Some(RESOLVED_BY_SYNTAX.to_string()),
        });
    }
    edges
}

/// Drop the last segment of a qualified name, whichever separator the
/// language used.
fn parent_prefix(qualified: &str) -> Option<&str> {
    let by_colons = qualified.rfind("::").map(|i| (i, 2));
    let by_dot = qualified.rfind('.').map(|i| (i, 1));
    let (idx, _len) = match (by_colons, by_dot) {
        (Some(a), Some(b)) => {
            if a.0 > b.0 {
                a
            } else {
                b
            }
        }
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };
    Some(&qualified[..idx])
}
