//! Incremental sync: content-hash-driven change detection and
//! minimally-disruptive reindexing.

use std::collections::{HashMap, HashSet};

use carto_core::cancel::CancelToken;
use carto_core::ids::content_hash;
use carto_core::store::SymbolStore;
use carto_core::types::{FileRecord, IndexWarning, NodeKind, SyncSummary, WarningKind};
use carto_parsers::walker::WalkEntry;

use crate::error::EngineError;
use crate::indexer::Engine;
use crate::resolve::{resolve_references, ResolveScope};

impl Engine {
    /// Compare the tree on disk against the store, then replace exactly the
    /// slices that changed.
    ///
    /// Partition: `added` (on disk, not in store), `modified` (hash
    /// changed), `removed` (in store, not on disk), `unchanged`. Removals
    /// cascade; added and modified files are re-extracted and committed one
    /// transaction each; resolution then runs restricted to references
    /// sourced in the touched files plus previously-unresolved references
    /// whose name matches a newly added node.
    ///
    /// Cancellation is observed at file boundaries; the partial summary is
    /// returned.
    pub fn sync(&mut self, cancel: &CancelToken) -> Result<SyncSummary, EngineError> {
        let entries = self.walker().walk();
        let mut summary = SyncSummary {
            files_checked: entries.len(),
            ..SyncSummary::default()
        };

        let mut existing: HashMap<String, FileRecord> = SymbolStore::get_all_files(&self.store)
            .into_iter()
            .map(|f| (f.path.clone(), f))
            .collect();

        let mut to_process: Vec<WalkEntry> = Vec::new();
        let mut added_paths: HashSet<String> = HashSet::new();

        for entry in entries {
            match existing.remove(&entry.rel_path) {
                None => {
                    added_paths.insert(entry.rel_path.clone());
                    to_process.push(entry);
                }
                Some(record) => {
                    if entry.size > self.config.max_file_size {
                        // An oversized file already on record is not
                        // re-attempted until its size changes.
                        if record.content_hash.is_empty() && record.size == entry.size {
                            continue;
                        }
                        to_process.push(entry);
                        continue;
                    }
                    match std::fs::read(&entry.path) {
                        Ok(content) => {
                            if content_hash(&content) != record.content_hash {
                                to_process.push(entry);
                            }
                        }
                        Err(e) => {
                            summary.errors.push(IndexWarning {
                                path: entry.rel_path.clone(),
                                kind: WarningKind::Io,
                                message: e.to_string(),
                            });
                        }
                    }
                }
            }
        }

        // Remove-phase first: files gone from disk cascade out of the store
        // before any re-extraction lands.
        let mut removed: Vec<String> = existing.into_keys().collect();
        removed.sort();
        for path in removed {
            if cancel.is_cancelled() {
                return Ok(summary);
            }
            self.store.delete_file(&path)?;
            summary.files_removed += 1;
        }

        let prepared = self.extract_entries(&to_process, cancel);

        let mut touched: Vec<String> = Vec::new();
        let mut new_names: HashSet<String> = HashSet::new();
        for file in prepared {
            if cancel.is_cancelled() {
                return Ok(summary);
            }
            if added_paths.contains(&file.record.path) {
                summary.files_added += 1;
            } else {
                summary.files_modified += 1;
            }
            summary.errors.extend(file.warnings.iter().cloned());
            touched.push(file.record.path.clone());
            for node in file.nodes.iter().filter(|n| n.kind != NodeKind::File) {
                new_names.insert(node.name.clone());
            }
            self.store
                .commit_file_slice(&file.record, &file.nodes, &file.edges)?;
        }

        if !cancel.is_cancelled() && (!touched.is_empty() || summary.files_removed > 0) {
            let hints = self.config.frameworks.clone();
            let mut names: Vec<String> = new_names.into_iter().collect();
            names.sort();
            resolve_references(
                &mut self.store,
                &self.root,
                &self.frameworks,
                &hints,
                ResolveScope::Touched {
                    files: touched,
                    new_names: names,
                },
            )?;
        }

        Ok(summary)
    }
}
