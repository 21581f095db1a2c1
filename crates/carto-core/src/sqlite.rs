use std::path::Path;

use rusqlite::{params, Connection, Result as SqlResult};

use crate::error::StoreError;
use crate::types::{Edge, EdgeKind, Node, NodeKind, SourceRange};

/// Highest schema version this build understands.
pub const SCHEMA_VERSION: u32 = 2;

const MIGRATION_V1: &str = "
    -- Tracked source files
    CREATE TABLE IF NOT EXISTS files (
        path TEXT PRIMARY KEY,
        language TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        mtime INTEGER NOT NULL,
        size INTEGER NOT NULL
    );

    -- Extracted symbols
    CREATE TABLE IF NOT EXISTS nodes (
        id TEXT PRIMARY KEY,
        kind TEXT NOT NULL,
        name TEXT NOT NULL,
        qualified_name TEXT NOT NULL,
        language TEXT NOT NULL,
        file_path TEXT NOT NULL,
        start_line INTEGER NOT NULL,
        start_col INTEGER NOT NULL,
        end_line INTEGER NOT NULL,
        end_col INTEGER NOT NULL,
        signature TEXT,
        docstring TEXT,
        is_exported INTEGER NOT NULL DEFAULT 0,
        updated_at INTEGER NOT NULL,
        UNIQUE (kind, file_path, qualified_name, start_line)
    );
    CREATE INDEX IF NOT EXISTS idx_nodes_file ON nodes(file_path);
    CREATE INDEX IF NOT EXISTS idx_nodes_kind ON nodes(kind);
    CREATE INDEX IF NOT EXISTS idx_nodes_name ON nodes(name);

    -- Relations; target_id stays NULL until the resolver lands a target
    CREATE TABLE IF NOT EXISTS edges (
        id INTEGER PRIMARY KEY,
        source_id TEXT NOT NULL,
        target_id TEXT,
        target_symbol TEXT NOT NULL,
        qualifier TEXT,
        kind TEXT NOT NULL,
        file_path TEXT NOT NULL,
        line INTEGER NOT NULL,
        col INTEGER NOT NULL,
        confidence REAL NOT NULL DEFAULT 0,
        resolved_by TEXT,
        UNIQUE (source_id, kind, target_symbol, line)
    );
    CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_id);
    CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id);
    CREATE INDEX IF NOT EXISTS idx_edges_kind ON edges(kind);
    CREATE INDEX IF NOT EXISTS idx_edges_file ON edges(file_path);
";

const MIGRATION_V2: &str = "
    -- Dense embeddings, one row per node
    CREATE TABLE IF NOT EXISTS vectors (
        node_id TEXT PRIMARY KEY,
        model TEXT NOT NULL,
        dim INTEGER NOT NULL,
        data BLOB NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_edges_symbol ON edges(target_symbol);
";

const MIGRATIONS: &[(u32, &str)] = &[(1, MIGRATION_V1), (2, MIGRATION_V2)];

/// SQLite-backed implementation of [`crate::store::SymbolStore`].
#[derive(Debug)]
pub struct SqliteStore {
    pub(crate) conn: Connection,
}

impl SqliteStore {
    /// Open or create a graph database at the given path and bring its
    /// schema up to [`SCHEMA_VERSION`].
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let mut store = SqliteStore { conn };
        store.run_migrations()?;
        Ok(store)
    }

    /// Create an in-memory graph database (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let mut store = SqliteStore { conn };
        store.run_migrations()?;
        Ok(store)
    }

    /// Apply every migration above the stored version, each inside its own
    /// transaction. A store written by a newer build is rejected.
    fn run_migrations(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;

        let stored = self.stored_version()?;
        if stored > SCHEMA_VERSION {
            return Err(StoreError::SchemaDowngrade {
                stored,
                supported: SCHEMA_VERSION,
            });
        }

        for (version, sql) in MIGRATIONS {
            if *version <= stored {
                continue;
            }
            let tx = self.conn.transaction()?;
            tx.execute_batch(sql)?;
            tx.execute(
                "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![version.to_string()],
            )?;
            tx.commit()?;
        }
        Ok(())
    }

    /// The schema version currently persisted, 0 for a fresh database.
    pub fn stored_version(&self) -> Result<u32, StoreError> {
        let version: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .ok();
        match version {
            None => Ok(0),
            Some(v) => v
                .parse()
                .map_err(|e| StoreError::Integrity(format!("invalid schema version: {e}"))),
        }
    }

    pub(crate) fn row_to_node(row: &rusqlite::Row) -> SqlResult<Node> {
        let kind_str: String = row.get("kind")?;
        Ok(Node {
            id: row.get("id")?,
            kind: NodeKind::parse(&kind_str),
            name: row.get("name")?,
            qualified_name: row.get("qualified_name")?,
            language: row.get("language")?,
            file_path: row.get("file_path")?,
            range: SourceRange {
                start_line: row.get("start_line")?,
                start_col: row.get("start_col")?,
                end_line: row.get("end_line")?,
                end_col: row.get("end_col")?,
            },
            signature: row.get("signature")?,
            docstring: row.get("docstring")?,
            is_exported: row.get::<_, i32>("is_exported")? != 0,
            updated_at: row.get("updated_at")?,
        })
    }

    pub(crate) fn row_to_edge(row: &rusqlite::Row) -> SqlResult<Edge> {
        let kind_str: String = row.get("kind")?;
        Ok(Edge {
            id: row.get("id")?,
            source_id: row.get("source_id")?,
            target_id: row.get("target_id")?,
            target_symbol: row.get("target_symbol")?,
            qualifier: row.get("qualifier")?,
            // The kind column is written from the closed enum; an unreadable
            // value is a corrupted row.
            kind: EdgeKind::parse(&kind_str).unwrap_or(EdgeKind::Calls),
            file_path: row.get("file_path")?,
            line: row.get("line")?,
            col: row.get("col")?,
            confidence: row.get("confidence")?,
            resolved_by: row.get("resolved_by")?,
        })
    }

    /// Unix seconds now; the single clock used for `updated_at` stamps.
    pub(crate) fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    /// Insert-or-update a node row inside an existing transaction.
    pub(crate) fn upsert_node_tx(
        tx: &rusqlite::Transaction,
        node: &Node,
        now: i64,
    ) -> Result<(), StoreError> {
        tx.execute(
            "INSERT INTO nodes (id, kind, name, qualified_name, language, file_path,
                                start_line, start_col, end_line, end_col,
                                signature, docstring, is_exported, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                name = excluded.name,
                qualified_name = excluded.qualified_name,
                language = excluded.language,
                file_path = excluded.file_path,
                start_line = excluded.start_line,
                start_col = excluded.start_col,
                end_line = excluded.end_line,
                end_col = excluded.end_col,
                signature = excluded.signature,
                docstring = excluded.docstring,
                is_exported = excluded.is_exported,
                updated_at = excluded.updated_at",
            params![
                node.id,
                node.kind.as_str(),
                node.name,
                node.qualified_name,
                node.language,
                node.file_path,
                node.range.start_line,
                node.range.start_col,
                node.range.end_line,
                node.range.end_col,
                node.signature,
                node.docstring,
                node.is_exported as i32,
                now,
            ],
        )?;
        Ok(())
    }

    /// Insert-or-update an edge row inside an existing transaction. Identity
    /// is `(source_id, kind, target_symbol, line)`.
    pub(crate) fn upsert_edge_tx(
        tx: &rusqlite::Transaction,
        edge: &Edge,
    ) -> Result<(), StoreError> {
        tx.execute(
            "INSERT INTO edges (source_id, target_id, target_symbol, qualifier, kind,
                                file_path, line, col, confidence, resolved_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(source_id, kind, target_symbol, line) DO UPDATE SET
                target_id = excluded.target_id,
                qualifier = excluded.qualifier,
                file_path = excluded.file_path,
                col = excluded.col,
                confidence = excluded.confidence,
                resolved_by = excluded.resolved_by",
            params![
                edge.source_id,
                edge.target_id,
                edge.target_symbol,
                edge.qualifier,
                edge.kind.as_str(),
                edge.file_path,
                edge.line,
                edge.col,
                edge.confidence,
                edge.resolved_by,
            ],
        )?;
        Ok(())
    }

    /// Edges that pointed at nodes which no longer exist revert to
    /// unresolved; their target_symbol keeps name queries working.
    pub(crate) fn demote_dangling_edges_tx(
        tx: &rusqlite::Transaction,
    ) -> Result<(), StoreError> {
        tx.execute(
            "UPDATE edges SET target_id = NULL, confidence = 0, resolved_by = NULL
             WHERE target_id IS NOT NULL
               AND target_id NOT IN (SELECT id FROM nodes)",
            [],
        )?;
        Ok(())
    }
}
