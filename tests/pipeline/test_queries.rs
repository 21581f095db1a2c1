use carto_core::types::{EdgeKind, NodeKind};
use carto_core::store::SymbolStore;
use tempfile::TempDir;

use crate::common::{init_and_index, write_file};

#[test]
fn mutual_imports_form_one_cycle_of_length_two() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "a.ts",
        "import { b } from './b';\nexport function a() { b(); }\n",
    );
    write_file(
        dir.path(),
        "b.ts",
        "import { a } from './a';\nexport function b() { a(); }\n",
    );
    let (engine, _) = init_and_index(&dir);

    let files = engine.store().get_nodes_by_kind(NodeKind::File);
    assert_eq!(files.len(), 2);

    let cycles = engine.graph().find_circular_dependencies();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].len(), 2);
    assert!(cycles[0].contains(&"a.ts".to_string()));
    assert!(cycles[0].contains(&"b.ts".to_string()));
}

#[test]
fn import_edges_resolve_to_file_nodes() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.ts", "import { f } from './lib/b';\n");
    write_file(dir.path(), "lib/b.ts", "export function f() {}\n");
    let (engine, _) = init_and_index(&dir);

    let a_file = engine
        .store()
        .get_nodes_by_file("a.ts")
        .into_iter()
        .find(|n| n.kind == NodeKind::File)
        .unwrap();
    let imports = engine
        .store()
        .get_outgoing_edges(&a_file.id, Some(&[EdgeKind::Imports]));
    assert_eq!(imports.len(), 2, "module-level and per-symbol edges");
    assert!(imports.iter().all(|e| e.target_id.is_some()));

    let b_file = engine
        .store()
        .get_nodes_by_file("lib/b.ts")
        .into_iter()
        .find(|n| n.kind == NodeKind::File)
        .unwrap();
    let f = engine
        .store()
        .get_nodes_by_file("lib/b.ts")
        .into_iter()
        .find(|n| n.name == "f")
        .unwrap();
    assert!(imports
        .iter()
        .any(|e| e.target_id.as_deref() == Some(b_file.id.as_str())));
    assert!(imports
        .iter()
        .any(|e| e.target_id.as_deref() == Some(f.id.as_str())));
}

#[test]
fn cross_file_calls_resolve_through_imports() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.ts", "export function fa() {}\n");
    write_file(
        dir.path(),
        "b.ts",
        "import { fa } from './a';\nexport function fb() { fa(); }\n",
    );
    let (engine, _) = init_and_index(&dir);

    let fb = engine.find_nodes_by_name("fb", Some(NodeKind::Function));
    let fa = engine.find_nodes_by_name("fa", Some(NodeKind::Function));
    assert_eq!(fb.len(), 1);
    assert_eq!(fa.len(), 1);

    let calls = engine
        .store()
        .get_outgoing_edges(&fb[0].id, Some(&[EdgeKind::Calls]));
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].target_id.as_deref(), Some(fa[0].id.as_str()));
    assert_eq!(calls[0].confidence, 0.9);
    assert_eq!(calls[0].resolved_by.as_deref(), Some("import"));
}

#[test]
fn impact_radius_grows_monotonically_with_depth() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.ts", "export function fa() {}\n");
    write_file(
        dir.path(),
        "b.ts",
        "import { fa } from './a';\nexport function fb() { fa(); }\n",
    );
    write_file(
        dir.path(),
        "c.ts",
        "import { fb } from './b';\nexport function fc() { fb(); }\n",
    );
    let (engine, _) = init_and_index(&dir);
    let graph = engine.graph();

    let fa = &engine.find_nodes_by_name("fa", None)[0];
    let fb = &engine.find_nodes_by_name("fb", None)[0];
    let fc = &engine.find_nodes_by_name("fc", None)[0];

    let zero = graph.impact_radius(&fa.id, 0);
    assert_eq!(zero.len(), 1);
    assert_eq!(zero[0].node.id, fa.id);
    assert_eq!(zero[0].depth, 0);

    let one = graph.impact_radius(&fa.id, 1);
    assert!(one.iter().any(|i| i.node.id == fb.id && i.depth == 1));
    assert!(one.iter().all(|i| i.node.id != fc.id));

    let two = graph.impact_radius(&fa.id, 2);
    assert!(two.iter().any(|i| i.node.id == fc.id && i.depth == 2));
    // Superset property
    for entry in &one {
        assert!(two.iter().any(|i| i.node.id == entry.node.id));
    }

    let callers = graph.get_callers(&fa.id);
    assert_eq!(callers.len(), 1);
    assert_eq!(callers[0].id, fb.id);
    let callees = graph.get_callees(&fb.id);
    assert_eq!(callees.len(), 1);
    assert_eq!(callees[0].id, fa.id);
}

#[test]
fn context_assembles_ancestors_children_and_refs() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "svc.ts",
        r#"import { log } from './log';

export class Service {
    run(): void {
        helper();
    }
}

function helper() {}
"#,
    );
    write_file(dir.path(), "log.ts", "export function log() {}\n");
    let (engine, _) = init_and_index(&dir);

    let class = &engine.find_nodes_by_name("Service", Some(NodeKind::Class))[0];
    let ctx = engine.graph().get_context(&class.id).unwrap();

    assert_eq!(ctx.node.id, class.id);
    assert_eq!(ctx.ancestors.len(), 1);
    assert_eq!(ctx.ancestors[0].kind, NodeKind::File);
    assert_eq!(ctx.children.len(), 1);
    assert_eq!(ctx.children[0].qualified_name, "Service.run");
    assert!(ctx.incoming.iter().all(|e| e.kind != EdgeKind::Contains));
    assert!(ctx.outgoing.iter().all(|e| e.kind != EdgeKind::Contains));
    assert_eq!(ctx.file_imports.len(), 2);
}
