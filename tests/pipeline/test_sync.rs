use std::fs;

use carto_core::cancel::CancelToken;
use carto_core::store::SymbolStore;
use carto_core::types::{EdgeKind, NodeKind};
use tempfile::TempDir;

use crate::common::{init_and_index, write_file};

#[test]
fn sync_with_no_changes_is_a_noop() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "src/a.ts", "export function f() {}\n");
    write_file(dir.path(), "src/b.py", "def g():\n    pass\n");
    let (mut engine, _) = init_and_index(&dir);

    let stats_before = engine.stats();
    let stamps_before: Vec<(String, i64)> = engine
        .store()
        .get_nodes_by_file("src/a.ts")
        .into_iter()
        .map(|n| (n.id, n.updated_at))
        .collect();

    let summary = engine.sync(&CancelToken::new()).unwrap();
    assert_eq!(summary.files_added, 0);
    assert_eq!(summary.files_modified, 0);
    assert_eq!(summary.files_removed, 0);
    assert_eq!(summary.files_checked, 2);
    assert!(summary.errors.is_empty());

    let stats_after = engine.stats();
    assert_eq!(stats_before.nodes, stats_after.nodes);
    assert_eq!(stats_before.edges, stats_after.edges);
    assert_eq!(stats_before.files, stats_after.files);

    // Unchanged files keep their updated_at stamps.
    let stamps_after: Vec<(String, i64)> = engine
        .store()
        .get_nodes_by_file("src/a.ts")
        .into_iter()
        .map(|n| (n.id, n.updated_at))
        .collect();
    assert_eq!(stamps_before, stamps_after);
}

/// Rename on disk with identical content: one added, one removed, new IDs.
#[test]
fn sync_after_rename_replaces_the_slice() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "old.ts", "export function f() {}\n");
    let (mut engine, _) = init_and_index(&dir);

    let old_id = engine.find_nodes_by_name("f", Some(NodeKind::Function))[0]
        .id
        .clone();

    fs::rename(dir.path().join("old.ts"), dir.path().join("new.ts")).unwrap();
    let summary = engine.sync(&CancelToken::new()).unwrap();
    assert_eq!(summary.files_added, 1);
    assert_eq!(summary.files_modified, 0);
    assert_eq!(summary.files_removed, 1);

    let hits = engine.find_nodes_by_name("f", Some(NodeKind::Function));
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].file_path, "new.ts");
    assert_ne!(hits[0].id, old_id);
    assert!(engine.store().get_node_by_id(&old_id).is_none());
    assert!(engine.store().get_file("old.ts").is_none());
}

#[test]
fn sync_reindexes_modified_files_only() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.ts", "export function one() {}\n");
    write_file(dir.path(), "b.ts", "export function two() {}\n");
    let (mut engine, _) = init_and_index(&dir);

    let b_stamp = engine.store().get_nodes_by_file("b.ts")[0].updated_at;
    write_file(
        dir.path(),
        "a.ts",
        "export function one() {}\nexport function extra() {}\n",
    );

    let summary = engine.sync(&CancelToken::new()).unwrap();
    assert_eq!(summary.files_added, 0);
    assert_eq!(summary.files_modified, 1);
    assert_eq!(summary.files_removed, 0);

    assert_eq!(
        engine.find_nodes_by_name("extra", Some(NodeKind::Function)).len(),
        1
    );
    // The untouched file was not rewritten.
    assert_eq!(engine.store().get_nodes_by_file("b.ts")[0].updated_at, b_stamp);
}

/// A reference that could not resolve at index time resolves when a later
/// sync adds a node with the matching name.
#[test]
fn sync_forward_discovers_previously_unresolved_names() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "main.ts",
        "export function main() { missingHelper(); }\n",
    );
    let (mut engine, _) = init_and_index(&dir);

    let main_node = engine.find_nodes_by_name("main", Some(NodeKind::Function))[0].clone();
    let calls = engine
        .store()
        .get_outgoing_edges(&main_node.id, Some(&[EdgeKind::Calls]));
    assert_eq!(calls.len(), 1);
    assert!(calls[0].target_id.is_none());
    assert_eq!(calls[0].target_symbol, "missingHelper");

    write_file(dir.path(), "helper.ts", "export function missingHelper() {}\n");
    let summary = engine.sync(&CancelToken::new()).unwrap();
    assert_eq!(summary.files_added, 1);

    let calls = engine
        .store()
        .get_outgoing_edges(&main_node.id, Some(&[EdgeKind::Calls]));
    assert_eq!(calls.len(), 1);
    let target = calls[0].target_id.as_deref().expect("resolved by discovery");
    let resolved = engine.store().get_node_by_id(target).unwrap();
    assert_eq!(resolved.file_path, "helper.ts");
    assert_eq!(calls[0].resolved_by.as_deref(), Some("global"));
}

#[test]
fn sync_removal_cascades_and_demotes_cross_file_edges() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.ts", "export function fa() {}\n");
    write_file(
        dir.path(),
        "b.ts",
        "import { fa } from './a';\nexport function fb() { fa(); }\n",
    );
    let (mut engine, _) = init_and_index(&dir);

    fs::remove_file(dir.path().join("a.ts")).unwrap();
    let summary = engine.sync(&CancelToken::new()).unwrap();
    assert_eq!(summary.files_removed, 1);

    assert!(engine.find_nodes_by_name("fa", None).is_empty());
    // b's call edge reverts to unresolved but keeps the symbol.
    let fb = &engine.find_nodes_by_name("fb", None)[0];
    let calls = engine
        .store()
        .get_outgoing_edges(&fb.id, Some(&[EdgeKind::Calls]));
    assert_eq!(calls.len(), 1);
    assert!(calls[0].target_id.is_none());
    assert_eq!(calls[0].target_symbol, "fa");
}

#[test]
fn cancelled_sync_returns_partial_summary() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.ts", "export function f() {}\n");
    let (mut engine, _) = init_and_index(&dir);

    write_file(dir.path(), "b.ts", "export function g() {}\n");
    let cancel = CancelToken::new();
    cancel.cancel();
    let summary = engine.sync(&cancel).unwrap();
    assert_eq!(summary.files_added, 0);
    assert!(engine.find_nodes_by_name("g", None).is_empty());
}
