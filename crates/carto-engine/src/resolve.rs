//! Multi-pass reference resolution.
//!
//! Unresolved edges are attacked by ordered passes; the first pass that
//! yields a target wins and stamps its confidence:
//!
//! 1. local: same file, declared inside the source or a file-level sibling (1.0)
//! 2. class: enclosing class hierarchy through extends/implements (0.95)
//! 3. import: exports of files reached through resolved import edges (0.9)
//! 4. framework: each active framework resolver, registry order
//! 5. global: simple-name match across the index, first by path lex order (0.5)
//!
//! Import edges themselves resolve first (specifier → file node, two-step),
//! then inheritance, then everything else, so later waves can lean on the
//! earlier ones. Each resolution is one atomic edge update.

use std::collections::HashSet;
use std::path::Path;

use carto_core::ids::node_id;
use carto_core::sqlite::SqliteStore;
use carto_core::store::SymbolStore;
use carto_core::types::{
    Edge, EdgeKind, Node, NodeKind, RefKind, ResolvedTarget, UnresolvedRef,
};
use carto_parsers::frameworks::{Framework, FrameworkContext, FrameworkRegistry};

use crate::context::StoreContext;
use crate::error::EngineError;

/// Which unresolved edges a resolution run looks at.
pub enum ResolveScope {
    /// Every unresolved edge in the store.
    All,
    /// Edges sourced from the touched files, plus previously-unresolved
    /// references whose symbol matches a newly added node name (forward
    /// discovery).
    Touched {
        files: Vec<String>,
        new_names: Vec<String>,
    },
}

/// Receiver spellings that keep a call inside its own class.
const SELF_QUALIFIERS: &[&str] = &["this", "self", "Self", "$this"];

pub fn resolve_references(
    store: &mut SqliteStore,
    root: &Path,
    registry: &FrameworkRegistry,
    framework_hints: &[String],
    scope: ResolveScope,
) -> Result<usize, EngineError> {
    let mut pending = collect_scope(store, &scope);
    // Waves: imports feed the class hierarchy, which feeds call resolution.
    pending.sort_by_key(|e| match e.kind {
        EdgeKind::Imports => 0u8,
        EdgeKind::Extends | EdgeKind::Implements => 1,
        _ => 2,
    });

    // Detection is pure and runs once per session.
    let active_names: Vec<String> = {
        let ctx = StoreContext::new(root, store);
        registry
            .detect_active(&ctx, framework_hints)
            .iter()
            .map(|f| f.name().to_string())
            .collect()
    };

    let mut resolved = 0usize;
    for wave in [0u8, 1, 2] {
        let wave_edges: Vec<&Edge> = pending
            .iter()
            .filter(|e| {
                (match e.kind {
                    EdgeKind::Imports => 0u8,
                    EdgeKind::Extends | EdgeKind::Implements => 1,
                    _ => 2,
                }) == wave
            })
            .collect();
        if wave_edges.is_empty() {
            continue;
        }

        let decisions: Vec<(i64, ResolvedTarget)> = {
            let ctx = StoreContext::new(root, store);
            let active = registry.by_names(&active_names);
            wave_edges
                .iter()
                .filter_map(|edge| decide(store, &ctx, &active, edge).map(|t| (edge.id, t)))
                .collect()
        };

        for (edge_id, target) in decisions {
            store.resolve_edge(
                edge_id,
                &target.target_node_id,
                target.confidence,
                target.resolved_by,
            )?;
            resolved += 1;
        }
    }
    Ok(resolved)
}

fn collect_scope(store: &SqliteStore, scope: &ResolveScope) -> Vec<Edge> {
    match scope {
        ResolveScope::All => store.get_unresolved_edges(),
        ResolveScope::Touched { files, new_names } => {
            let mut edges = store.get_unresolved_edges_in_files(files);
            let mut seen: HashSet<i64> = edges.iter().map(|e| e.id).collect();
            for name in new_names {
                for edge in store.get_unresolved_edges_by_symbol(name) {
                    if seen.insert(edge.id) {
                        edges.push(edge);
                    }
                }
            }
            edges
        }
    }
}

fn decide(
    store: &SqliteStore,
    ctx: &dyn FrameworkContext,
    active: &[&dyn Framework],
    edge: &Edge,
) -> Option<ResolvedTarget> {
    if edge.kind == EdgeKind::Imports {
        return resolve_import(store, edge);
    }

    let source = store.get_node_by_id(&edge.source_id)?;
    let name = edge.target_symbol.as_str();
    let qualifier = edge.qualifier.as_deref();
    let sep = separator_for(&source.language);

    if let Some(t) = pass_local(store, &source, name, qualifier, sep) {
        return Some(t);
    }
    if let Some(t) = pass_class(store, &source, name, qualifier, sep) {
        return Some(t);
    }
    if let Some(t) = pass_import(store, edge, name) {
        return Some(t);
    }
    if let Some(t) = pass_framework(active, ctx, edge, &source) {
        return Some(t);
    }
    pass_global(store, &source, name)
}

fn separator_for(language: &str) -> &'static str {
    match language {
        "rust" | "cpp" | "php" => "::",
        _ => ".",
    }
}

fn self_call(qualifier: Option<&str>) -> bool {
    match qualifier {
        None => true,
        Some(q) => SELF_QUALIFIERS.contains(&q),
    }
}

/// Pass 1: names declared inside the source node, or file-level siblings
/// when the source itself is at the top level.
fn pass_local(
    store: &SqliteStore,
    source: &Node,
    name: &str,
    qualifier: Option<&str>,
    sep: &str,
) -> Option<ResolvedTarget> {
    if qualifier.is_some() {
        return None;
    }
    let in_file = store.get_nodes_by_file(&source.file_path);

    let nested = format!("{}{sep}{}", source.qualified_name, name);
    if let Some(candidate) = in_file
        .iter()
        .find(|n| n.qualified_name == nested && n.id != source.id)
    {
        return Some(ResolvedTarget {
            target_node_id: candidate.id.clone(),
            confidence: 1.0,
            resolved_by: "local",
        });
    }

    let source_is_top =
        source.kind == NodeKind::File || !source.qualified_name.contains(sep);
    if source_is_top {
        if let Some(candidate) = in_file.iter().find(|n| {
            n.kind != NodeKind::File
                && n.name == name
                && n.qualified_name == n.name
                && n.id != source.id
        }) {
            return Some(ResolvedTarget {
                target_node_id: candidate.id.clone(),
                confidence: 1.0,
                resolved_by: "local",
            });
        }
    }
    None
}

/// Pass 2: members of the enclosing class and its resolved ancestors.
fn pass_class(
    store: &SqliteStore,
    source: &Node,
    name: &str,
    qualifier: Option<&str>,
    sep: &str,
) -> Option<ResolvedTarget> {
    if !self_call(qualifier) {
        return None;
    }
    let class = enclosing_class(store, source)?;

    let mut queue = vec![class];
    let mut visited = HashSet::new();
    let mut hops = 0;
    while let Some(cls) = queue.pop() {
        if !visited.insert(cls.id.clone()) || hops > 8 {
            continue;
        }
        hops += 1;

        let member = format!("{}{sep}{}", cls.qualified_name, name);
        if let Some(candidate) = store
            .get_nodes_by_file(&cls.file_path)
            .iter()
            .find(|n| n.qualified_name == member && n.id != source.id)
        {
            return Some(ResolvedTarget {
                target_node_id: candidate.id.clone(),
                confidence: 0.95,
                resolved_by: "class",
            });
        }

        for edge in store.get_outgoing_edges(
            &cls.id,
            Some(&[EdgeKind::Extends, EdgeKind::Implements]),
        ) {
            if let Some(base) = edge.target_id.as_deref().and_then(|id| store.get_node_by_id(id))
            {
                queue.push(base);
            }
        }
    }
    None
}

fn is_class_kind(kind: NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Class
            | NodeKind::Struct
            | NodeKind::Interface
            | NodeKind::Trait
            | NodeKind::Enum
    )
}

fn enclosing_class(store: &SqliteStore, source: &Node) -> Option<Node> {
    if is_class_kind(source.kind) {
        return Some(source.clone());
    }
    let mut current = source.id.clone();
    for _ in 0..16 {
        let parents = store.get_incoming_edges(&current, Some(&[EdgeKind::Contains]));
        let parent = parents
            .first()
            .and_then(|e| store.get_node_by_id(&e.source_id))?;
        if is_class_kind(parent.kind) {
            return Some(parent);
        }
        if parent.kind == NodeKind::File {
            return None;
        }
        current = parent.id;
    }
    None
}

/// Pass 3: exported symbols of files reached through this file's resolved
/// import edges.
fn pass_import(store: &SqliteStore, edge: &Edge, name: &str) -> Option<ResolvedTarget> {
    let file_id = node_id(NodeKind::File, &edge.file_path, &edge.file_path, 1);
    for import in store.get_outgoing_edges(&file_id, Some(&[EdgeKind::Imports])) {
        let Some(target) = import.target_id.as_deref().and_then(|id| store.get_node_by_id(id))
        else {
            continue;
        };
        if target.kind == NodeKind::File {
            if let Some(candidate) = store
                .get_nodes_by_file(&target.file_path)
                .iter()
                .find(|n| n.kind != NodeKind::File && n.name == name && n.is_exported)
            {
                return Some(ResolvedTarget {
                    target_node_id: candidate.id.clone(),
                    confidence: 0.9,
                    resolved_by: "import",
                });
            }
        } else if target.name == name {
            // Per-symbol import edge already pointing at the symbol.
            return Some(ResolvedTarget {
                target_node_id: target.id,
                confidence: 0.9,
                resolved_by: "import",
            });
        }
    }
    None
}

/// Pass 4: active framework resolvers, in registry order.
fn pass_framework(
    active: &[&dyn Framework],
    ctx: &dyn FrameworkContext,
    edge: &Edge,
    source: &Node,
) -> Option<ResolvedTarget> {
    let kind = match edge.kind {
        EdgeKind::Calls => RefKind::Call,
        EdgeKind::Imports => RefKind::Import,
        EdgeKind::Extends => RefKind::Extends,
        EdgeKind::Implements => RefKind::Implements,
        EdgeKind::TypeOf => RefKind::TypeUse,
        EdgeKind::Reads => RefKind::Read,
        EdgeKind::Writes => RefKind::Write,
        EdgeKind::Contains | EdgeKind::Returns => return None,
    };
    let reference = UnresolvedRef {
        source_node_id: source.id.clone(),
        name: edge.target_symbol.clone(),
        qualifier: edge.qualifier.clone(),
        kind,
        file_path: edge.file_path.clone(),
        line: edge.line,
        col: edge.col,
    };
    for framework in active {
        if let Some(target) = framework.resolve(&reference, ctx) {
            return Some(target);
        }
    }
    None
}

/// Pass 5: any node with the matching simple name. Ambiguous matches take
/// the first by file path lex order. Documented policy, not an accident.
fn pass_global(store: &SqliteStore, source: &Node, name: &str) -> Option<ResolvedTarget> {
    let mut candidates = store.get_nodes_by_name(name, None);
    candidates.retain(|n| n.kind != NodeKind::File && n.id != source.id);
    if candidates.len() > 1 {
        tracing::debug!(
            symbol = name,
            candidates = candidates.len(),
            "ambiguous global resolution, taking first by path"
        );
    }
    candidates.first().map(|candidate| ResolvedTarget {
        target_node_id: candidate.id.clone(),
        confidence: 0.5,
        resolved_by: "global",
    })
}

/// Two-step import resolution: specifier → file node (exact, then
/// case-insensitive, then namespace-normalized), then per-symbol imports →
/// an exported node inside that file.
fn resolve_import(store: &SqliteStore, edge: &Edge) -> Option<ResolvedTarget> {
    let (specifier, symbol) = match edge.qualifier.as_deref() {
        Some(spec) => (spec, Some(edge.target_symbol.as_str())),
        None => (edge.target_symbol.as_str(), None),
    };

    let (file_path, confidence) = specifier_to_file(store, &edge.file_path, specifier)?;
    match symbol {
        None => Some(ResolvedTarget {
            target_node_id: node_id(NodeKind::File, &file_path, &file_path, 1),
            confidence,
            resolved_by: "import",
        }),
        Some(sym) => {
            let nodes = store.get_nodes_by_file(&file_path);
            let candidate = nodes
                .iter()
                .find(|n| n.kind != NodeKind::File && n.name == sym && n.is_exported)?;
            Some(ResolvedTarget {
                target_node_id: candidate.id.clone(),
                confidence: confidence.min(0.9),
                resolved_by: "import",
            })
        }
    }
}

/// Candidate relative paths a specifier may denote, tried in order.
fn specifier_candidates(importing_file: &str, specifier: &str) -> Vec<String> {
    const EXTS: &[&str] = &[
        "", ".ts", ".tsx", ".js", ".py", ".go", ".rs", ".java", ".c", ".h", ".cpp", ".hpp",
        ".cs", ".php", ".rb",
    ];
    let mut bases = Vec::new();

    if specifier.starts_with('.') && !specifier.starts_with("..") || specifier.starts_with("./")
        || specifier.starts_with("../")
    {
        let dir = importing_file.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
        bases.push(join_relative(dir, specifier));
    } else {
        bases.push(specifier.trim_start_matches('/').to_string());
        // Dotted module paths: os.path -> os/path
        if specifier.contains('.') && !specifier.contains('/') {
            bases.push(specifier.replace('.', "/"));
        }
        if specifier.contains("::") {
            bases.push(specifier.replace("::", "/"));
        }
    }

    let mut candidates = Vec::new();
    for base in bases {
        for ext in EXTS {
            candidates.push(format!("{base}{ext}"));
        }
        candidates.push(format!("{base}/index.ts"));
        candidates.push(format!("{base}/__init__.py"));
        candidates.push(format!("{base}/mod.rs"));
    }
    candidates
}

/// Textual relative-path join with `.`/`..` folding.
fn join_relative(dir: &str, specifier: &str) -> String {
    let mut parts: Vec<&str> = dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in specifier.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

fn specifier_to_file(
    store: &SqliteStore,
    importing_file: &str,
    specifier: &str,
) -> Option<(String, f64)> {
    let files = store.get_all_files();
    let candidates = specifier_candidates(importing_file, specifier);

    // Exact match.
    for candidate in &candidates {
        if files.iter().any(|f| &f.path == candidate) {
            return Some((candidate.clone(), 1.0));
        }
    }

    // Case-insensitive match.
    for candidate in &candidates {
        let lower = candidate.to_lowercase();
        if let Some(f) = files.iter().find(|f| f.path.to_lowercase() == lower) {
            return Some((f.path.clone(), 0.9));
        }
    }

    // Namespace-normalized: A.B.C -> C, matched against file stems.
    let last = specifier
        .rsplit(['.', '/', ':'])
        .find(|s| !s.is_empty())?;
    let wanted = last.to_lowercase();
    files
        .iter()
        .find(|f| {
            let stem = f
                .path
                .rsplit('/')
                .next()
                .and_then(|n| n.rsplit_once('.').map(|(s, _)| s))
                .unwrap_or("");
            stem.to_lowercase() == wanted
        })
        .map(|f| (f.path.clone(), 0.8))
}

#[cfg(test)]
mod tests {
    use super::*;
    use carto_core::types::SourceRange;

    fn node(kind: NodeKind, file: &str, qualified: &str, line: u32) -> Node {
        let name = qualified
            .rsplit(['.', ':'])
            .next()
            .unwrap_or(qualified)
            .to_string();
        Node {
            id: node_id(kind, file, qualified, line),
            kind,
            name,
            qualified_name: qualified.to_string(),
            language: "typescript".to_string(),
            file_path: file.to_string(),
            range: SourceRange {
                start_line: line,
                start_col: 0,
                end_line: line + 2,
                end_col: 0,
            },
            signature: None,
            docstring: None,
            is_exported: true,
            updated_at: 0,
        }
    }

    fn unresolved(source: &Node, symbol: &str, kind: EdgeKind, line: u32) -> Edge {
        Edge {
            id: 0,
            source_id: source.id.clone(),
            target_id: None,
            target_symbol: symbol.to_string(),
            qualifier: None,
            kind,
            file_path: source.file_path.clone(),
            line,
            col: 0,
            confidence: 0.0,
            resolved_by: None,
        }
    }

    fn run(store: &mut SqliteStore, root: &Path) -> usize {
        resolve_references(
            store,
            root,
            &FrameworkRegistry::empty(),
            &[],
            ResolveScope::All,
        )
        .unwrap()
    }

    #[test]
    fn local_pass_resolves_file_siblings_at_full_confidence() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::in_memory().unwrap();
        let caller = node(NodeKind::Function, "src/a.ts", "run", 5);
        let callee = node(NodeKind::Function, "src/a.ts", "greet", 1);
        store.upsert_node(&caller).unwrap();
        store.upsert_node(&callee).unwrap();
        store
            .upsert_edge(&unresolved(&caller, "greet", EdgeKind::Calls, 6))
            .unwrap();

        assert_eq!(run(&mut store, dir.path()), 1);
        let edges = store.get_outgoing_edges(&caller.id, Some(&[EdgeKind::Calls]));
        assert_eq!(edges[0].target_id.as_deref(), Some(callee.id.as_str()));
        assert_eq!(edges[0].confidence, 1.0);
        assert_eq!(edges[0].resolved_by.as_deref(), Some("local"));
    }

    #[test]
    fn class_pass_resolves_sibling_methods_at_095() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::in_memory().unwrap();
        let class = node(NodeKind::Class, "src/auth.ts", "AuthService", 1);
        let login = node(NodeKind::Method, "src/auth.ts", "AuthService.login", 8);
        let validate = node(NodeKind::Method, "src/auth.ts", "AuthService.validate", 3);
        for n in [&class, &login, &validate] {
            store.upsert_node(n).unwrap();
        }
        // contains edges give the resolver the enclosure chain
        for (parent, child) in [(&class, &login), (&class, &validate)] {
            store
                .upsert_edge(&Edge {
                    id: 0,
                    source_id: parent.id.clone(),
                    target_id: Some(child.id.clone()),
                    target_symbol: child.qualified_name.clone(),
                    qualifier: None,
                    kind: EdgeKind::Contains,
                    file_path: child.file_path.clone(),
                    line: child.range.start_line,
                    col: 0,
                    confidence: 1.0,
                    resolved_by: Some("syntax".to_string()),
                })
                .unwrap();
        }
        let mut call = unresolved(&login, "validate", EdgeKind::Calls, 9);
        call.qualifier = Some("this".to_string());
        store.upsert_edge(&call).unwrap();

        assert_eq!(run(&mut store, dir.path()), 1);
        let edges = store.get_outgoing_edges(&login.id, Some(&[EdgeKind::Calls]));
        assert_eq!(edges[0].target_id.as_deref(), Some(validate.id.as_str()));
        assert_eq!(edges[0].confidence, 0.95);
        assert_eq!(edges[0].resolved_by.as_deref(), Some("class"));
    }

    #[test]
    fn global_fallback_takes_first_by_path_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::in_memory().unwrap();
        let caller = node(NodeKind::Function, "src/main.ts", "main", 1);
        let in_a = node(NodeKind::Function, "src/a.ts", "helper", 1);
        let in_b = node(NodeKind::Function, "src/b.ts", "helper", 1);
        for n in [&caller, &in_a, &in_b] {
            store.upsert_node(n).unwrap();
        }
        store
            .upsert_edge(&unresolved(&caller, "helper", EdgeKind::Calls, 2))
            .unwrap();

        assert_eq!(run(&mut store, dir.path()), 1);
        let edges = store.get_outgoing_edges(&caller.id, Some(&[EdgeKind::Calls]));
        assert_eq!(edges[0].target_id.as_deref(), Some(in_a.id.as_str()));
        assert_eq!(edges[0].confidence, 0.5);
        assert_eq!(edges[0].resolved_by.as_deref(), Some("global"));
    }

    #[test]
    fn unmatched_reference_stays_unresolved_with_symbol() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::in_memory().unwrap();
        let caller = node(NodeKind::Function, "src/a.ts", "run", 1);
        store.upsert_node(&caller).unwrap();
        store
            .upsert_edge(&unresolved(&caller, "TInterfacedObject", EdgeKind::Extends, 2))
            .unwrap();

        assert_eq!(run(&mut store, dir.path()), 0);
        let unresolved = store.get_unresolved_edges();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].target_symbol, "TInterfacedObject");
    }

    #[test]
    fn import_edge_resolves_relative_specifier_to_file_node() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::in_memory().unwrap();
        for path in ["a.ts", "b.ts"] {
            let file = node(NodeKind::File, path, path, 1);
            store.upsert_node(&file).unwrap();
            store
                .upsert_file(&carto_core::types::FileRecord {
                    path: path.to_string(),
                    language: "typescript".to_string(),
                    content_hash: "h".to_string(),
                    mtime: 0,
                    size: 1,
                })
                .unwrap();
        }
        let fa = node(NodeKind::File, "a.ts", "a.ts", 1);
        let fb = node(NodeKind::File, "b.ts", "b.ts", 1);
        store
            .upsert_edge(&unresolved(&fa, "./b", EdgeKind::Imports, 1))
            .unwrap();

        assert_eq!(run(&mut store, dir.path()), 1);
        let edges = store.get_outgoing_edges(&fa.id, Some(&[EdgeKind::Imports]));
        assert_eq!(edges[0].target_id.as_deref(), Some(fb.id.as_str()));
        assert_eq!(edges[0].confidence, 1.0);
    }

    #[test]
    fn per_symbol_import_points_at_exported_node() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::in_memory().unwrap();
        for path in ["a.ts", "lib/paths.ts"] {
            let file = node(NodeKind::File, path, path, 1);
            store.upsert_node(&file).unwrap();
            store
                .upsert_file(&carto_core::types::FileRecord {
                    path: path.to_string(),
                    language: "typescript".to_string(),
                    content_hash: "h".to_string(),
                    mtime: 0,
                    size: 1,
                })
                .unwrap();
        }
        let join = node(NodeKind::Function, "lib/paths.ts", "join", 3);
        store.upsert_node(&join).unwrap();

        let fa = node(NodeKind::File, "a.ts", "a.ts", 1);
        let mut edge = unresolved(&fa, "join", EdgeKind::Imports, 1);
        edge.qualifier = Some("./lib/paths".to_string());
        store.upsert_edge(&edge).unwrap();

        assert_eq!(run(&mut store, dir.path()), 1);
        let edges = store.get_outgoing_edges(&fa.id, Some(&[EdgeKind::Imports]));
        assert_eq!(edges[0].target_id.as_deref(), Some(join.id.as_str()));
        assert_eq!(edges[0].resolved_by.as_deref(), Some("import"));
    }

    #[test]
    fn namespace_normalized_import_matches_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::in_memory().unwrap();
        for path in ["app.py", "services/auth.py"] {
            let file = node(NodeKind::File, path, path, 1);
            store.upsert_node(&file).unwrap();
            store
                .upsert_file(&carto_core::types::FileRecord {
                    path: path.to_string(),
                    language: "python".to_string(),
                    content_hash: "h".to_string(),
                    mtime: 0,
                    size: 1,
                })
                .unwrap();
        }
        let fa = node(NodeKind::File, "app.py", "app.py", 1);
        store
            .upsert_edge(&unresolved(&fa, "myapp.services.Auth", EdgeKind::Imports, 1))
            .unwrap();

        assert_eq!(run(&mut store, dir.path()), 1);
        let edges = store.get_outgoing_edges(&fa.id, Some(&[EdgeKind::Imports]));
        let target = edges[0].target_id.as_deref().unwrap();
        let resolved = store.get_node_by_id(target).unwrap();
        assert_eq!(resolved.file_path, "services/auth.py");
        assert_eq!(edges[0].confidence, 0.8);
    }
}
