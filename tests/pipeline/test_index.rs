use carto_core::cancel::CancelToken;
use carto_core::error::StoreError;
use carto_core::types::{EdgeKind, NodeKind, WarningKind};
use carto_core::store::SymbolStore;
use carto_engine::{Engine, EngineError};
use tempfile::TempDir;

use crate::common::{init_and_index, write_file};

const AUTH_TS: &str = r#"interface TokenValidator {
    validate(token: string): boolean;
}

export class AuthService extends BaseService implements TokenValidator {
    validate(token: string): boolean {
        return token.length > 0;
    }

    login(user: string, token: string): boolean {
        return this.validate(token);
    }
}
"#;

#[test]
fn init_twice_is_rejected() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::init(dir.path()).unwrap();
    drop(engine);
    match Engine::init(dir.path()) {
        Err(EngineError::Store(StoreError::AlreadyInitialized(_))) => {}
        Ok(_) => panic!("expected AlreadyInitialized, got Ok"),
        Err(other) => panic!("expected AlreadyInitialized, got {other}"),
    }
}

#[test]
fn open_without_init_is_rejected() {
    let dir = TempDir::new().unwrap();
    match Engine::open(dir.path()) {
        Err(EngineError::Store(StoreError::NotInitialized(_))) => {}
        Ok(_) => panic!("expected NotInitialized, got Ok"),
        Err(other) => panic!("expected NotInitialized, got {other}"),
    }
}

#[test]
fn open_after_init_sees_the_same_store() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "src/a.ts", "export function f() {}\n");
    let (engine, _) = init_and_index(&dir);
    let nodes_before = engine.stats().nodes;
    drop(engine);

    let engine = Engine::open(dir.path()).unwrap();
    assert_eq!(engine.stats().nodes, nodes_before);
}

/// Interface + implementing class + intra-class call: the unit/interface
/// fixture shape, in TypeScript.
#[test]
fn class_interface_fixture_produces_expected_graph() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "src/auth.ts", AUTH_TS);
    let (engine, summary) = init_and_index(&dir);
    assert_eq!(summary.files_indexed, 1);

    // Node set
    let find = |kind: NodeKind, qualified: &str| {
        engine
            .store()
            .get_nodes_by_file("src/auth.ts")
            .into_iter()
            .find(|n| n.kind == kind && n.qualified_name == qualified)
            .unwrap_or_else(|| panic!("missing {kind:?} {qualified}"))
    };
    let iface = find(NodeKind::Interface, "TokenValidator");
    find(NodeKind::Method, "TokenValidator.validate");
    let class = find(NodeKind::Class, "AuthService");
    let validate = find(NodeKind::Method, "AuthService.validate");
    let login = find(NodeKind::Method, "AuthService.login");

    // extends -> unknown base: unresolved, symbol retained
    let outgoing = engine.store().get_outgoing_edges(&class.id, Some(&[EdgeKind::Extends]));
    assert_eq!(outgoing.len(), 1);
    assert!(outgoing[0].target_id.is_none());
    assert_eq!(outgoing[0].target_symbol, "BaseService");

    // implements -> same-file interface: resolved, confidence 1.0
    let implements = engine
        .store()
        .get_outgoing_edges(&class.id, Some(&[EdgeKind::Implements]));
    assert_eq!(implements.len(), 1);
    assert_eq!(implements[0].target_id.as_deref(), Some(iface.id.as_str()));
    assert_eq!(implements[0].confidence, 1.0);

    // login --calls-> validate through the class pass, confidence 0.95
    let calls = engine.store().get_outgoing_edges(&login.id, Some(&[EdgeKind::Calls]));
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].target_id.as_deref(), Some(validate.id.as_str()));
    assert_eq!(calls[0].confidence, 0.95);
    assert_eq!(calls[0].resolved_by.as_deref(), Some("class"));
}

#[test]
fn every_node_chain_terminates_at_a_file_node() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "src/auth.ts", AUTH_TS);
    write_file(dir.path(), "src/util.py", "def helper():\n    pass\n");
    let (engine, _) = init_and_index(&dir);

    let graph = engine.graph();
    for file in engine.store().get_all_files() {
        for node in engine.store().get_nodes_by_file(&file.path) {
            if node.kind == NodeKind::File {
                continue;
            }
            let ancestors = graph.get_ancestors(&node.id);
            assert_eq!(
                ancestors.last().map(|a| a.kind),
                Some(NodeKind::File),
                "chain of {} does not end at a file",
                node.qualified_name
            );
        }
    }
}

#[test]
fn parse_error_is_contained_and_partial() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "src/broken.ts",
        "function good() {}\n\nfunction broken( {\n",
    );
    write_file(dir.path(), "src/fine.ts", "export function fine() {}\n");
    let (engine, summary) = init_and_index(&dir);

    assert_eq!(summary.files_indexed, 2);
    let parse_warnings: Vec<_> = summary
        .warnings
        .iter()
        .filter(|w| w.kind == WarningKind::ParseFailure)
        .collect();
    assert_eq!(parse_warnings.len(), 1);
    assert_eq!(parse_warnings[0].path, "src/broken.ts");

    // The file node and anything before the error region are present.
    let broken_nodes = engine.store().get_nodes_by_file("src/broken.ts");
    assert!(broken_nodes.iter().any(|n| n.kind == NodeKind::File));
    assert!(broken_nodes.iter().any(|n| n.name == "good"));
    assert!(!engine.store().get_nodes_by_file("src/fine.ts").is_empty());
}

#[test]
fn oversized_file_is_skipped_with_warning() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "src/big.ts", &"x".repeat(512));
    write_file(dir.path(), "src/small.ts", "export function f() {}\n");

    let mut engine = Engine::init(dir.path()).unwrap();
    let mut config = engine.config().clone();
    config.max_file_size = 100;
    engine.update_config(config).unwrap();

    let summary = engine.index_all(&CancelToken::new()).unwrap();
    let oversized: Vec<_> = summary
        .warnings
        .iter()
        .filter(|w| w.kind == WarningKind::OversizedFile)
        .collect();
    assert_eq!(oversized.len(), 1);
    assert_eq!(oversized[0].path, "src/big.ts");

    let big_nodes = engine.store().get_nodes_by_file("src/big.ts");
    assert!(big_nodes.is_empty());

    // Unchanged oversized files are not re-attempted on sync.
    let sync = engine.sync(&CancelToken::new()).unwrap();
    assert_eq!(sync.files_modified, 0);
    assert!(sync.errors.is_empty());
}

#[test]
fn unsupported_language_is_skipped_with_warning() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "App.swift", "struct App {}\n");
    write_file(dir.path(), "main.ts", "export function main() {}\n");
    let (engine, summary) = init_and_index(&dir);

    let skipped: Vec<_> = summary
        .warnings
        .iter()
        .filter(|w| w.kind == WarningKind::LanguageUnsupported)
        .collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].path, "App.swift");
    assert!(engine.store().get_nodes_by_file("App.swift").is_empty());
    assert!(!engine.store().get_nodes_by_file("main.ts").is_empty());
}

#[test]
fn paths_escaping_the_root_are_rejected() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "src/a.ts", "export function f() {}\n");
    let (engine, _) = init_and_index(&dir);

    match engine.nodes_in_file("../outside.ts") {
        Err(EngineError::Store(StoreError::PathEscape(p))) => {
            assert_eq!(p, std::path::PathBuf::from("../outside.ts"));
        }
        other => panic!("expected PathEscape, got {other:?}"),
    }
    assert!(!engine.nodes_in_file("src/a.ts").unwrap().is_empty());
}

#[test]
fn cancellation_stops_at_file_boundaries() {
    let dir = TempDir::new().unwrap();
    for i in 0..5 {
        write_file(
            dir.path(),
            &format!("src/f{i}.ts"),
            "export function f() {}\n",
        );
    }
    let mut engine = Engine::init(dir.path()).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let summary = engine.index_all(&cancel).unwrap();
    assert_eq!(summary.files_indexed, 0);
    assert_eq!(engine.stats().nodes, 0);
}

#[test]
fn framework_routes_are_extracted_when_detected() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "requirements.txt", "flask==3.0\n");
    write_file(
        dir.path(),
        "app.py",
        "@app.route(\"/users\")\ndef list_users():\n    return []\n",
    );
    let (engine, _) = init_and_index(&dir);

    assert_eq!(engine.active_framework_names(), vec!["flask"]);
    let routes = engine
        .store()
        .get_nodes_by_kind(NodeKind::Route);
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].qualified_name, "GET /users");

    // The registration call resolves to the route node.
    let incoming = engine
        .store()
        .get_incoming_edges(&routes[0].id, Some(&[EdgeKind::Calls]));
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].resolved_by.as_deref(), Some("framework:flask"));
}
