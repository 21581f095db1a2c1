//! The engine facade: project lifecycle, full indexing, and queries.
//!
//! Extraction is the parallel hot path: files are extracted independently
//! on rayon workers and their results committed serially to the store, one
//! transaction per file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use carto_core::cancel::CancelToken;
use carto_core::config::ProjectConfig;
use carto_core::error::StoreError;
use carto_core::ids::content_hash;
use carto_core::lock::WriterLock;
use carto_core::sqlite::SqliteStore;
use carto_core::store::SymbolStore;
use carto_core::types::{
    Edge, EdgeKind, FileRecord, IndexSummary, IndexWarning, Node, NodeKind, StoreStats,
    WarningKind,
};
use carto_core::{CARTO_DIR, DB_FILE};
use carto_graph::Graph;
use carto_parsers::error::ParseError;
use carto_parsers::extract::{Extractor, FileExtraction, RESOLVED_BY_SYNTAX};
use carto_parsers::frameworks::{Framework, FrameworkRegistry};
use carto_parsers::walker::{FileWalker, WalkEntry};

use crate::context::StoreContext;
use crate::error::EngineError;
use crate::resolve::{resolve_references, ResolveScope};
use crate::vector::{self, Embedder, SearchHit};

/// A file's extraction output, ready for one commit transaction.
pub(crate) struct PreparedFile {
    pub record: FileRecord,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub warnings: Vec<IndexWarning>,
}

pub struct Engine {
    pub(crate) root: PathBuf,
    pub(crate) carto_dir: PathBuf,
    pub(crate) config: ProjectConfig,
    pub(crate) store: SqliteStore,
    pub(crate) extractor: Extractor,
    pub(crate) frameworks: FrameworkRegistry,
    _lock: WriterLock,
}

impl Engine {
    /// Initialize a project: create the `.carto` directory, write the
    /// default config, open the store. Fails with `AlreadyInitialized` when
    /// a store is already present.
    pub fn init(root: &Path) -> Result<Self, EngineError> {
        let root = root
            .canonicalize()
            .map_err(|e| StoreError::io(root, &e))?;
        let carto_dir = root.join(CARTO_DIR);
        if carto_dir.join(DB_FILE).exists() {
            return Err(StoreError::AlreadyInitialized(root).into());
        }
        std::fs::create_dir_all(&carto_dir).map_err(|e| StoreError::io(&carto_dir, &e))?;

        let mut config = ProjectConfig::default();
        config.project_name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        config.save(&carto_dir)?;

        Self::open_at(root, carto_dir, config)
    }

    /// Open an initialized project. Fails with `NotInitialized` when no
    /// store exists under the root.
    pub fn open(root: &Path) -> Result<Self, EngineError> {
        let root = root
            .canonicalize()
            .map_err(|e| StoreError::io(root, &e))?;
        let carto_dir = root.join(CARTO_DIR);
        if !carto_dir.join(DB_FILE).exists() {
            return Err(StoreError::NotInitialized(root).into());
        }
        let config = ProjectConfig::load(&carto_dir);
        Self::open_at(root, carto_dir, config)
    }

    fn open_at(
        root: PathBuf,
        carto_dir: PathBuf,
        config: ProjectConfig,
    ) -> Result<Self, EngineError> {
        let lock = WriterLock::acquire(&carto_dir)?;
        let store = SqliteStore::open(&carto_dir.join(DB_FILE))?;
        Ok(Self {
            root,
            carto_dir,
            config,
            store,
            extractor: Extractor::new(),
            frameworks: FrameworkRegistry::with_defaults(),
            _lock: lock,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Replace the config and persist it atomically.
    pub fn update_config(&mut self, config: ProjectConfig) -> Result<(), EngineError> {
        config.save(&self.carto_dir)?;
        self.config = config;
        Ok(())
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SqliteStore {
        &mut self.store
    }

    pub fn graph(&self) -> Graph<'_> {
        Graph::new(&self.store)
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Name-based lookup over the whole index.
    pub fn find_nodes_by_name(&self, name: &str, kind: Option<NodeKind>) -> Vec<Node> {
        self.store.get_nodes_by_name(name, kind)
    }

    /// Nodes in one file; the path is validated against the project root.
    pub fn nodes_in_file(&self, path: &str) -> Result<Vec<Node>, EngineError> {
        let abs = carto_core::paths::validate_under_root(&self.root, Path::new(path))?;
        let key = carto_core::paths::store_key(&self.root, &abs);
        Ok(self.store.get_nodes_by_file(&key))
    }

    pub(crate) fn walker(&self) -> FileWalker {
        FileWalker::new(
            &self.root,
            &self.config.include,
            &self.config.exclude,
            &self.config.languages,
        )
    }

    /// Names of the framework resolvers active for this session.
    pub fn active_framework_names(&self) -> Vec<String> {
        let ctx = StoreContext::new(&self.root, &self.store);
        self.frameworks
            .detect_active(&ctx, &self.config.frameworks)
            .iter()
            .map(|f| f.name().to_string())
            .collect()
    }

    /// Full index of the project: walk, extract in parallel, commit
    /// serially, then resolve every reference.
    pub fn index_all(&mut self, cancel: &CancelToken) -> Result<IndexSummary, EngineError> {
        let entries = self.walker().walk();
        let mut summary = IndexSummary::default();
        let prepared = self.extract_entries(&entries, cancel);

        for file in prepared {
            if cancel.is_cancelled() {
                return Ok(summary);
            }
            summary.files_indexed += 1;
            summary.nodes_added += file.nodes.len();
            summary.edges_added += file.edges.len();
            summary.warnings.extend(file.warnings.iter().cloned());
            self.store
                .commit_file_slice(&file.record, &file.nodes, &file.edges)?;
        }

        if !cancel.is_cancelled() {
            let hints = self.config.frameworks.clone();
            resolve_references(
                &mut self.store,
                &self.root,
                &self.frameworks,
                &hints,
                ResolveScope::All,
            )?;
        }
        Ok(summary)
    }

    /// Extraction fan-out. Pure per file; the store is untouched here. The
    /// connection is not shareable across threads, so the workers borrow
    /// only the extractor, the size cap, and the detected frameworks.
    pub(crate) fn extract_entries(
        &self,
        entries: &[WalkEntry],
        cancel: &CancelToken,
    ) -> Vec<PreparedFile> {
        let active: Vec<&dyn Framework> = {
            let ctx = StoreContext::new(&self.root, &self.store);
            self.frameworks.detect_active(&ctx, &self.config.frameworks)
        };
        let extractor = &self.extractor;
        let max_file_size = self.config.max_file_size;

        let mut prepared: Vec<(usize, PreparedFile)> = entries
            .par_iter()
            .enumerate()
            .filter_map(|(idx, entry)| {
                if cancel.is_cancelled() {
                    return None;
                }
                Self::prepare_file(extractor, max_file_size, entry, &active).map(|p| (idx, p))
            })
            .collect();
        prepared.sort_by_key(|(idx, _)| *idx);
        prepared.into_iter().map(|(_, p)| p).collect()
    }

    /// Read, hash, parse, and extract one file. Every failure mode here is
    /// contained: the worst outcome is a file record with warnings and no
    /// nodes. Takes no `self` because it runs on rayon workers.
    fn prepare_file(
        extractor: &Extractor,
        max_file_size: u64,
        entry: &WalkEntry,
        active: &[&dyn Framework],
    ) -> Option<PreparedFile> {
        let mtime = std::fs::metadata(&entry.path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        if entry.size > max_file_size {
            // Recorded with an empty hash: sync recognizes the unchanged
            // oversized file by size and does not re-attempt it.
            return Some(PreparedFile {
                record: FileRecord {
                    path: entry.rel_path.clone(),
                    language: entry.language.tag().to_string(),
                    content_hash: String::new(),
                    mtime,
                    size: entry.size,
                },
                nodes: Vec::new(),
                edges: Vec::new(),
                warnings: vec![IndexWarning {
                    path: entry.rel_path.clone(),
                    kind: WarningKind::OversizedFile,
                    message: format!(
                        "{} bytes exceeds max_file_size {}",
                        entry.size, max_file_size
                    ),
                }],
            });
        }

        let content = match std::fs::read(&entry.path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %entry.rel_path, error = %e, "unreadable file skipped");
                return Some(PreparedFile {
                    record: FileRecord {
                        path: entry.rel_path.clone(),
                        language: entry.language.tag().to_string(),
                        content_hash: String::new(),
                        mtime,
                        size: entry.size,
                    },
                    nodes: Vec::new(),
                    edges: Vec::new(),
                    warnings: vec![IndexWarning {
                        path: entry.rel_path.clone(),
                        kind: WarningKind::Io,
                        message: e.to_string(),
                    }],
                });
            }
        };

        let record = FileRecord {
            path: entry.rel_path.clone(),
            language: entry.language.tag().to_string(),
            content_hash: content_hash(&content),
            mtime,
            size: entry.size,
        };

        let extraction = match extractor.extract(&entry.rel_path, &content, entry.language) {
            Ok(ex) => ex,
            Err(e) => {
                let kind = match &e {
                    ParseError::UnsupportedLanguage(_) => WarningKind::LanguageUnsupported,
                    _ => WarningKind::ParseFailure,
                };
                return Some(PreparedFile {
                    record,
                    nodes: Vec::new(),
                    edges: Vec::new(),
                    warnings: vec![IndexWarning {
                        path: entry.rel_path.clone(),
                        kind,
                        message: e.to_string(),
                    }],
                });
            }
        };

        let mut warnings = Vec::new();
        if extraction.had_errors {
            warnings.push(IndexWarning {
                path: entry.rel_path.clone(),
                kind: WarningKind::ParseFailure,
                message: "syntax errors; partial extraction kept".to_string(),
            });
        }

        let FileExtraction {
            mut nodes,
            mut edges,
            refs,
            ..
        } = extraction;
        let file_node_id = nodes[0].id.clone();

        // Framework node hooks run after generic extraction.
        for framework in active {
            for route in framework.extract_nodes(&entry.rel_path, &content) {
                edges.push(Edge {
                    id: 0,
                    source_id: file_node_id.clone(),
                    target_id: Some(route.id.clone()),
                    target_symbol: route.qualified_name.clone(),
                    qualifier: None,
                    kind: EdgeKind::Contains,
                    file_path: entry.rel_path.clone(),
                    line: route.range.start_line,
                    col: route.range.start_col,
                    confidence: 1.0,
                    resolved_by: Some(RESOLVED_BY_SYNTAX.to_string()),
                });
                nodes.push(route);
            }
        }
        let mut seen = HashSet::new();
        nodes.retain(|n| seen.insert(n.id.clone()));

        // Unresolved references land as unresolved edges; target_symbol
        // keeps the name so queries work before (and without) resolution.
        for r in refs {
            edges.push(Edge {
                id: 0,
                source_id: r.source_node_id,
                target_id: None,
                target_symbol: r.name,
                qualifier: r.qualifier,
                kind: r.kind.edge_kind(),
                file_path: entry.rel_path.clone(),
                line: r.line,
                col: r.col,
                confidence: 0.0,
                resolved_by: None,
            });
        }

        Some(PreparedFile {
            record,
            nodes,
            edges,
            warnings,
        })
    }

    /// Embed every symbol's semantic text through the external model and
    /// store the vectors in batches.
    pub fn embed_all(&mut self, embedder: &dyn Embedder) -> Result<usize, EngineError> {
        if !self.config.enable_embeddings {
            return Err(EngineError::EmbeddingUnavailable(
                "embeddings are disabled in config".to_string(),
            ));
        }

        let mut nodes: Vec<Node> = Vec::new();
        for file in self.store.get_all_files() {
            nodes.extend(
                self.store
                    .get_nodes_by_file(&file.path)
                    .into_iter()
                    .filter(|n| n.kind != NodeKind::File),
            );
        }

        let mut stored = 0;
        for chunk in nodes.chunks(64) {
            let texts: Vec<String> = chunk.iter().map(vector::semantic_text).collect();
            let embeddings = embedder.embed(&texts)?;
            let entries: Vec<carto_core::types::VectorEntry> = chunk
                .iter()
                .zip(embeddings)
                .map(|(node, embedding)| carto_core::types::VectorEntry {
                    node_id: node.id.clone(),
                    embedding,
                    model: embedder.model_name().to_string(),
                })
                .collect();
            vector::store_vector_batch(&mut self.store, &entries)?;
            stored += entries.len();
        }
        Ok(stored)
    }

    /// Semantic search over stored vectors. Structural queries never touch
    /// this path, so an unavailable model only fails here.
    pub fn semantic_search(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchHit>, EngineError> {
        if !self.config.enable_embeddings {
            return Err(EngineError::EmbeddingUnavailable(
                "embeddings are disabled in config".to_string(),
            ));
        }
        let embedded = embedder.embed(&[query.to_string()])?;
        let query_vec = embedded.into_iter().next().ok_or_else(|| {
            EngineError::EmbeddingUnavailable("model returned no embedding".to_string())
        })?;
        vector::search(&self.store, &query_vec, limit, min_score)
    }
}
