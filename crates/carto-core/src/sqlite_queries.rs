use rusqlite::params;

use crate::error::StoreError;
use crate::sqlite::SqliteStore;
use crate::store::SymbolStore;
use crate::types::{
    Edge, EdgeKind, FileRecord, Node, NodeKind, StoreStats, VectorEntry,
};

/// Render a kind filter as a SQL fragment. Kind strings come from the closed
/// enum, so inlining them is safe.
fn kind_filter(column: &str, kinds: Option<&[EdgeKind]>) -> String {
    match kinds {
        None => String::new(),
        Some(ks) if ks.is_empty() => String::new(),
        Some(ks) => {
            let list: Vec<String> = ks.iter().map(|k| format!("'{}'", k.as_str())).collect();
            format!(" AND {} IN ({})", column, list.join(", "))
        }
    }
}

fn pack_f32(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

fn unpack_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

impl SqliteStore {
    fn query_nodes(&self, sql: &str, p: &[&dyn rusqlite::ToSql]) -> Vec<Node> {
        let mut stmt = match self.conn.prepare(sql) {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };
        let result = match stmt.query_map(p, Self::row_to_node) {
            Ok(rows) => rows.filter_map(|r| r.ok()).collect(),
            Err(_) => Vec::new(),
        };
        result
    }

    fn query_edges(&self, sql: &str, p: &[&dyn rusqlite::ToSql]) -> Vec<Edge> {
        let mut stmt = match self.conn.prepare(sql) {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };
        let result = match stmt.query_map(p, Self::row_to_edge) {
            Ok(rows) => rows.filter_map(|r| r.ok()).collect(),
            Err(_) => Vec::new(),
        };
        result
    }

    fn count(&self, sql: &str) -> usize {
        self.conn
            .query_row(sql, [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .unwrap_or(0)
    }
}

impl SymbolStore for SqliteStore {
    fn upsert_file(&mut self, file: &FileRecord) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO files (path, language, content_hash, mtime, size)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(path) DO UPDATE SET
                language = excluded.language,
                content_hash = excluded.content_hash,
                mtime = excluded.mtime,
                size = excluded.size",
            params![
                file.path,
                file.language,
                file.content_hash,
                file.mtime,
                file.size
            ],
        )?;
        Ok(())
    }

    fn get_file(&self, path: &str) -> Option<FileRecord> {
        self.conn
            .query_row(
                "SELECT path, language, content_hash, mtime, size FROM files WHERE path = ?1",
                params![path],
                |row| {
                    Ok(FileRecord {
                        path: row.get(0)?,
                        language: row.get(1)?,
                        content_hash: row.get(2)?,
                        mtime: row.get(3)?,
                        size: row.get(4)?,
                    })
                },
            )
            .ok()
    }

    fn get_all_files(&self) -> Vec<FileRecord> {
        let mut stmt = match self.conn.prepare(
            "SELECT path, language, content_hash, mtime, size FROM files ORDER BY path",
        ) {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };
        let result = match stmt.query_map([], |row| {
            Ok(FileRecord {
                path: row.get(0)?,
                language: row.get(1)?,
                content_hash: row.get(2)?,
                mtime: row.get(3)?,
                size: row.get(4)?,
            })
        }) {
            Ok(rows) => rows.filter_map(|r| r.ok()).collect(),
            Err(_) => Vec::new(),
        };
        result
    }

    fn delete_file(&mut self, path: &str) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM vectors WHERE node_id IN (SELECT id FROM nodes WHERE file_path = ?1)",
            params![path],
        )?;
        tx.execute("DELETE FROM edges WHERE file_path = ?1", params![path])?;
        tx.execute("DELETE FROM nodes WHERE file_path = ?1", params![path])?;
        tx.execute("DELETE FROM files WHERE path = ?1", params![path])?;
        Self::demote_dangling_edges_tx(&tx)?;
        tx.commit()?;
        Ok(())
    }

    fn upsert_node(&mut self, node: &Node) -> Result<(), StoreError> {
        let now = Self::now();
        let tx = self.conn.transaction()?;
        Self::upsert_node_tx(&tx, node, now)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_nodes_by_file(&mut self, path: &str) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM vectors WHERE node_id IN (SELECT id FROM nodes WHERE file_path = ?1)",
            params![path],
        )?;
        tx.execute("DELETE FROM nodes WHERE file_path = ?1", params![path])?;
        Self::demote_dangling_edges_tx(&tx)?;
        tx.commit()?;
        Ok(())
    }

    fn get_node_by_id(&self, id: &str) -> Option<Node> {
        let mut stmt = self.conn.prepare("SELECT * FROM nodes WHERE id = ?1").ok()?;
        stmt.query_row(params![id], Self::row_to_node).ok()
    }

    fn get_nodes_by_file(&self, path: &str) -> Vec<Node> {
        self.query_nodes(
            "SELECT * FROM nodes WHERE file_path = ?1 ORDER BY start_line, start_col",
            &[&path],
        )
    }

    fn get_nodes_by_kind(&self, kind: NodeKind) -> Vec<Node> {
        self.query_nodes(
            "SELECT * FROM nodes WHERE kind = ?1 ORDER BY file_path, start_line",
            &[&kind.as_str()],
        )
    }

    fn get_nodes_by_name(&self, name: &str, kind: Option<NodeKind>) -> Vec<Node> {
        match kind {
            None => self.query_nodes(
                "SELECT * FROM nodes WHERE name = ?1 ORDER BY file_path, start_line",
                &[&name],
            ),
            Some(k) => self.query_nodes(
                "SELECT * FROM nodes WHERE name = ?1 AND kind = ?2
                 ORDER BY file_path, start_line",
                &[&name, &k.as_str()],
            ),
        }
    }

    fn upsert_edge(&mut self, edge: &Edge) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        Self::upsert_edge_tx(&tx, edge)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_edges_by_file(&mut self, path: &str) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM edges WHERE file_path = ?1", params![path])?;
        Ok(())
    }

    fn get_incoming_edges(&self, node_id: &str, kinds: Option<&[EdgeKind]>) -> Vec<Edge> {
        let sql = format!(
            "SELECT * FROM edges WHERE target_id = ?1{} ORDER BY file_path, line",
            kind_filter("kind", kinds)
        );
        self.query_edges(&sql, &[&node_id])
    }

    fn get_outgoing_edges(&self, node_id: &str, kinds: Option<&[EdgeKind]>) -> Vec<Edge> {
        let sql = format!(
            "SELECT * FROM edges WHERE source_id = ?1{} ORDER BY file_path, line",
            kind_filter("kind", kinds)
        );
        self.query_edges(&sql, &[&node_id])
    }

    fn get_unresolved_edges(&self) -> Vec<Edge> {
        self.query_edges(
            "SELECT * FROM edges WHERE target_id IS NULL ORDER BY file_path, line",
            &[],
        )
    }

    fn get_unresolved_edges_in_files(&self, paths: &[String]) -> Vec<Edge> {
        if paths.is_empty() {
            return Vec::new();
        }
        let placeholders: Vec<String> = (1..=paths.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "SELECT * FROM edges WHERE target_id IS NULL AND file_path IN ({})
             ORDER BY file_path, line",
            placeholders.join(", ")
        );
        let p: Vec<&dyn rusqlite::ToSql> =
            paths.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
        self.query_edges(&sql, p.as_slice())
    }

    fn get_unresolved_edges_by_symbol(&self, name: &str) -> Vec<Edge> {
        // target_symbol may carry a qualifier ("obj.bar", "mod::bar"); match
        // the trailing simple name too.
        self.query_edges(
            "SELECT * FROM edges WHERE target_id IS NULL
               AND (target_symbol = ?1
                    OR target_symbol LIKE '%.' || ?1
                    OR target_symbol LIKE '%::' || ?1)
             ORDER BY file_path, line",
            &[&name],
        )
    }

    fn resolve_edge(
        &mut self,
        edge_id: i64,
        target_node_id: &str,
        confidence: f64,
        resolved_by: &str,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE edges SET target_id = ?1, confidence = ?2, resolved_by = ?3
             WHERE id = ?4",
            params![target_node_id, confidence, resolved_by, edge_id],
        )?;
        Ok(())
    }

    fn commit_file_slice(
        &mut self,
        file: &FileRecord,
        nodes: &[Node],
        edges: &[Edge],
    ) -> Result<(), StoreError> {
        let now = Self::now();
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO files (path, language, content_hash, mtime, size)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(path) DO UPDATE SET
                language = excluded.language,
                content_hash = excluded.content_hash,
                mtime = excluded.mtime,
                size = excluded.size",
            params![
                file.path,
                file.language,
                file.content_hash,
                file.mtime,
                file.size
            ],
        )?;

        // Remove-phase first: the old slice disappears before the new one
        // lands, all inside this transaction.
        tx.execute(
            "DELETE FROM vectors WHERE node_id IN (SELECT id FROM nodes WHERE file_path = ?1)",
            params![file.path],
        )?;
        tx.execute("DELETE FROM edges WHERE file_path = ?1", params![file.path])?;
        tx.execute("DELETE FROM nodes WHERE file_path = ?1", params![file.path])?;

        for node in nodes {
            Self::upsert_node_tx(&tx, node, now)?;
        }
        for edge in edges {
            Self::upsert_edge_tx(&tx, edge)?;
        }
        Self::demote_dangling_edges_tx(&tx)?;

        tx.commit()?;
        Ok(())
    }

    fn upsert_vector(&mut self, entry: &VectorEntry) -> Result<(), StoreError> {
        self.upsert_vector_batch(std::slice::from_ref(entry))
    }

    fn upsert_vector_batch(&mut self, entries: &[VectorEntry]) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let now = Self::now();
        let tx = self.conn.transaction()?;

        // The first stored vector fixes the index dimensionality.
        let existing_dim: Option<i64> = tx
            .query_row("SELECT dim FROM vectors LIMIT 1", [], |row| row.get(0))
            .ok();
        let mut dim = existing_dim;

        for entry in entries {
            let entry_dim = entry.embedding.len() as i64;
            match dim {
                Some(d) if d != entry_dim => {
                    return Err(StoreError::Integrity(format!(
                        "vector dimension mismatch: index is {d}, got {entry_dim} for node {}",
                        entry.node_id
                    )));
                }
                Some(_) => {}
                None => dim = Some(entry_dim),
            }
            tx.execute(
                "INSERT INTO vectors (node_id, model, dim, data, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(node_id) DO UPDATE SET
                    model = excluded.model,
                    dim = excluded.dim,
                    data = excluded.data,
                    updated_at = excluded.updated_at",
                params![
                    entry.node_id,
                    entry.model,
                    entry_dim,
                    pack_f32(&entry.embedding),
                    now
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_vector(&mut self, node_id: &str) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM vectors WHERE node_id = ?1", params![node_id])?;
        Ok(())
    }

    fn get_vector(&self, node_id: &str) -> Option<VectorEntry> {
        self.conn
            .query_row(
                "SELECT node_id, model, data FROM vectors WHERE node_id = ?1",
                params![node_id],
                |row| {
                    let data: Vec<u8> = row.get(2)?;
                    Ok(VectorEntry {
                        node_id: row.get(0)?,
                        model: row.get(1)?,
                        embedding: unpack_f32(&data),
                    })
                },
            )
            .ok()
    }

    fn get_all_vectors(&self) -> Vec<VectorEntry> {
        let mut stmt = match self
            .conn
            .prepare("SELECT node_id, model, data FROM vectors ORDER BY node_id")
        {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };
        let result = match stmt.query_map([], |row| {
            let data: Vec<u8> = row.get(2)?;
            Ok(VectorEntry {
                node_id: row.get(0)?,
                model: row.get(1)?,
                embedding: unpack_f32(&data),
            })
        }) {
            Ok(rows) => rows.filter_map(|r| r.ok()).collect(),
            Err(_) => Vec::new(),
        };
        result
    }

    fn stats(&self) -> StoreStats {
        StoreStats {
            files: self.count("SELECT COUNT(*) FROM files"),
            nodes: self.count("SELECT COUNT(*) FROM nodes"),
            edges: self.count("SELECT COUNT(*) FROM edges"),
            resolved_edges: self.count("SELECT COUNT(*) FROM edges WHERE target_id IS NOT NULL"),
            vectors: self.count("SELECT COUNT(*) FROM vectors"),
        }
    }
}
