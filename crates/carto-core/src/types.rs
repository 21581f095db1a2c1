use serde::{Deserialize, Serialize};

/// Node kinds in the knowledge graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    File,
    Module,
    Class,
    Struct,
    Interface,
    Trait,
    Enum,
    Function,
    Method,
    Constructor,
    Destructor,
    Property,
    Field,
    Variable,
    Constant,
    TypeAlias,
    Route,
    Component,
    Parameter,
    Import,
    Unknown,
}

impl NodeKind {
    /// Returns the lowercase string representation of this node kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Module => "module",
            NodeKind::Class => "class",
            NodeKind::Struct => "struct",
            NodeKind::Interface => "interface",
            NodeKind::Trait => "trait",
            NodeKind::Enum => "enum",
            NodeKind::Function => "function",
            NodeKind::Method => "method",
            NodeKind::Constructor => "constructor",
            NodeKind::Destructor => "destructor",
            NodeKind::Property => "property",
            NodeKind::Field => "field",
            NodeKind::Variable => "variable",
            NodeKind::Constant => "constant",
            NodeKind::TypeAlias => "type_alias",
            NodeKind::Route => "route",
            NodeKind::Component => "component",
            NodeKind::Parameter => "parameter",
            NodeKind::Import => "import",
            NodeKind::Unknown => "unknown",
        }
    }

    /// Parse the stored string form back into a kind. Unknown strings map to
    /// [`NodeKind::Unknown`] so old databases never fail a read.
    pub fn parse(s: &str) -> Self {
        match s {
            "file" => NodeKind::File,
            "module" => NodeKind::Module,
            "class" => NodeKind::Class,
            "struct" => NodeKind::Struct,
            "interface" => NodeKind::Interface,
            "trait" => NodeKind::Trait,
            "enum" => NodeKind::Enum,
            "function" => NodeKind::Function,
            "method" => NodeKind::Method,
            "constructor" => NodeKind::Constructor,
            "destructor" => NodeKind::Destructor,
            "property" => NodeKind::Property,
            "field" => NodeKind::Field,
            "variable" => NodeKind::Variable,
            "constant" => NodeKind::Constant,
            "type_alias" => NodeKind::TypeAlias,
            "route" => NodeKind::Route,
            "component" => NodeKind::Component,
            "parameter" => NodeKind::Parameter,
            "import" => NodeKind::Import,
            _ => NodeKind::Unknown,
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edge kinds between graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Contains,
    Calls,
    Imports,
    Extends,
    Implements,
    Returns,
    TypeOf,
    Reads,
    Writes,
}

impl EdgeKind {
    /// Returns the lowercase string representation of this edge kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Contains => "contains",
            EdgeKind::Calls => "calls",
            EdgeKind::Imports => "imports",
            EdgeKind::Extends => "extends",
            EdgeKind::Implements => "implements",
            EdgeKind::Returns => "returns",
            EdgeKind::TypeOf => "type_of",
            EdgeKind::Reads => "reads",
            EdgeKind::Writes => "writes",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "contains" => Some(EdgeKind::Contains),
            "calls" => Some(EdgeKind::Calls),
            "imports" => Some(EdgeKind::Imports),
            "extends" => Some(EdgeKind::Extends),
            "implements" => Some(EdgeKind::Implements),
            "returns" => Some(EdgeKind::Returns),
            "type_of" => Some(EdgeKind::TypeOf),
            "reads" => Some(EdgeKind::Reads),
            "writes" => Some(EdgeKind::Writes),
            _ => None,
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source range of a node, 1-based lines, 0-based columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRange {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

/// A named entity extracted from source.
///
/// The `id` is a pure function of `(kind, file_path, qualified_name,
/// start_line)`, see [`crate::ids::node_id`], so re-indexing an unchanged
/// file reproduces identical IDs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub name: String,
    pub qualified_name: String,
    pub language: String,
    pub file_path: String,
    pub range: SourceRange,
    pub signature: Option<String>,
    pub docstring: Option<String>,
    pub is_exported: bool,
    /// Unix seconds of the last write that touched this node.
    pub updated_at: i64,
}

impl Node {
    /// Recompute the deterministic ID from the identity fields.
    pub fn compute_id(&self) -> String {
        crate::ids::node_id(
            self.kind,
            &self.file_path,
            &self.qualified_name,
            self.range.start_line,
        )
    }
}

/// A directed relation between two nodes.
///
/// `target_id` is `None` while the reference is unresolved; `target_symbol`
/// always retains the name-based target so name queries keep working.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Row handle assigned by the store on insert; 0 until stored. Edge
    /// identity for uniqueness purposes is `(source_id, kind, target_symbol,
    /// line)`, not this value.
    #[serde(default)]
    pub id: i64,
    pub source_id: String,
    pub target_id: Option<String>,
    /// Name-based target: the simple name of a call/type reference, or the
    /// import specifier for module-level imports.
    pub target_symbol: String,
    /// Receiver or module qualifier accompanying the symbol (`obj` in
    /// `obj.bar()`, the specifier of a per-symbol import).
    pub qualifier: Option<String>,
    pub kind: EdgeKind,
    /// File containing the source of the relation; slice deletion is keyed
    /// on this.
    pub file_path: String,
    pub line: u32,
    pub col: u32,
    /// Resolution confidence (0.0 = guess, 1.0 = certain). Structural edges
    /// derived from syntax alone are always 1.0.
    pub confidence: f64,
    /// Which resolver pass produced `target_id`, when resolved.
    pub resolved_by: Option<String>,
}

impl Edge {
    pub fn is_resolved(&self) -> bool {
        self.target_id.is_some()
    }
}

/// A tracked source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Relative path from the project root; the primary key.
    pub path: String,
    pub language: String,
    /// base62(xxh64) over the raw file bytes.
    pub content_hash: String,
    /// Unix seconds of the file's mtime at index time.
    pub mtime: i64,
    pub size: u64,
}

/// The flavour of an unresolved reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Call,
    Import,
    Extends,
    Implements,
    TypeUse,
    Read,
    Write,
}

impl RefKind {
    /// The edge kind a reference of this flavour becomes once stored.
    pub fn edge_kind(&self) -> EdgeKind {
        match self {
            RefKind::Call => EdgeKind::Calls,
            RefKind::Import => EdgeKind::Imports,
            RefKind::Extends => EdgeKind::Extends,
            RefKind::Implements => EdgeKind::Implements,
            RefKind::TypeUse => EdgeKind::TypeOf,
            RefKind::Read => EdgeKind::Reads,
            RefKind::Write => EdgeKind::Writes,
        }
    }
}

/// A name-based reference awaiting resolver attention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnresolvedRef {
    pub source_node_id: String,
    pub name: String,
    /// Receiver or module qualifier (`obj` in `obj.bar()`, the specifier of
    /// a per-symbol import).
    pub qualifier: Option<String>,
    pub kind: RefKind,
    pub file_path: String,
    pub line: u32,
    pub col: u32,
}

/// A stored embedding for one node. Dimensionality is fixed per index;
/// mixing dimensions is rejected at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
    pub node_id: String,
    pub embedding: Vec<f32>,
    pub model: String,
}

/// The outcome of one resolver pass for one reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTarget {
    pub target_node_id: String,
    pub confidence: f64,
    pub resolved_by: &'static str,
}

/// Warning taxonomy for contained per-file failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    ParseFailure,
    LanguageUnsupported,
    OversizedFile,
    Io,
}

impl std::fmt::Display for WarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WarningKind::ParseFailure => "parse_failure",
            WarningKind::LanguageUnsupported => "language_unsupported",
            WarningKind::OversizedFile => "oversized_file",
            WarningKind::Io => "io",
        };
        f.write_str(s)
    }
}

/// A contained per-file failure: path, kind, and a short message, never an
/// internal stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexWarning {
    pub path: String,
    pub kind: WarningKind,
    pub message: String,
}

/// Result of a full indexing run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexSummary {
    pub files_indexed: usize,
    pub nodes_added: usize,
    pub edges_added: usize,
    pub warnings: Vec<IndexWarning>,
}

/// Result of an incremental sync run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSummary {
    pub files_added: usize,
    pub files_modified: usize,
    pub files_removed: usize,
    pub files_checked: usize,
    pub errors: Vec<IndexWarning>,
}

/// Aggregate store counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub files: usize,
    pub nodes: usize,
    pub edges: usize,
    pub resolved_edges: usize,
    pub vectors: usize,
}
