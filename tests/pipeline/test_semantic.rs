use carto_core::store::SymbolStore;
use carto_core::types::VectorEntry;
use carto_engine::{vector, Embedder, Engine, EngineError};
use tempfile::TempDir;

use crate::common::{init_and_index, write_file};

/// Deterministic stand-in for the external embedding model: maps keywords
/// onto fixed axes of a 3-dimensional space.
struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
        Ok(texts
            .iter()
            .map(|t| {
                let t = t.to_lowercase();
                let mut v = vec![0.0f32, 0.0, 0.0];
                if t.contains("auth") {
                    v[0] = 1.0;
                }
                if t.contains("parse") {
                    v[1] = 1.0;
                }
                if t.contains("render") {
                    v[2] = 1.0;
                }
                if v == [0.0, 0.0, 0.0] {
                    v[2] = 0.1;
                }
                v
            })
            .collect())
    }
}

/// The vector search ranking scenario: three unit vectors, query along the
/// first axis.
#[test]
fn search_ranking_and_min_score() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.ts", "export function f() {}\n");
    let (mut engine, _) = init_and_index(&dir);

    let norm = (0.9f32 * 0.9 + 0.1 * 0.1).sqrt();
    let entries = vec![
        VectorEntry {
            node_id: "a".into(),
            embedding: vec![1.0, 0.0, 0.0],
            model: "keyword-test".into(),
        },
        VectorEntry {
            node_id: "b".into(),
            embedding: vec![0.9 / norm, 0.1 / norm, 0.0],
            model: "keyword-test".into(),
        },
        VectorEntry {
            node_id: "c".into(),
            embedding: vec![0.0, 1.0, 0.0],
            model: "keyword-test".into(),
        },
    ];
    vector::store_vector_batch(engine.store_mut(), &entries).unwrap();

    let hits = vector::search(engine.store(), &[1.0, 0.0, 0.0], 3, f32::MIN).unwrap();
    let order: Vec<_> = hits.iter().map(|h| h.node_id.as_str()).collect();
    assert_eq!(order, vec!["a", "b", "c"]);
    assert!((hits[0].score - 1.0).abs() < 1e-5);

    let filtered = vector::search(engine.store(), &[1.0, 0.0, 0.0], 3, 0.5).unwrap();
    let order: Vec<_> = filtered.iter().map(|h| h.node_id.as_str()).collect();
    assert_eq!(order, vec!["a", "b"]);
}

#[test]
fn embed_all_then_semantic_search_finds_the_right_symbol() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "src/auth.ts",
        "export function authenticate(token: string): boolean { return true; }\n",
    );
    write_file(
        dir.path(),
        "src/parser.ts",
        "export function parseConfig(raw: string): object { return {}; }\n",
    );
    let (mut engine, _) = init_and_index(&dir);

    let stored = engine.embed_all(&KeywordEmbedder).unwrap();
    assert!(stored >= 2);

    let hits = engine
        .semantic_search(&KeywordEmbedder, "auth token check", 5, 0.5)
        .unwrap();
    assert!(!hits.is_empty());
    let top = engine.store().get_node_by_id(&hits[0].node_id).unwrap();
    assert_eq!(top.name, "authenticate");
}

#[test]
fn semantic_search_fails_when_embeddings_disabled() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.ts", "export function f() {}\n");
    let mut engine = Engine::init(dir.path()).unwrap();
    let mut config = engine.config().clone();
    config.enable_embeddings = false;
    engine.update_config(config).unwrap();

    match engine.semantic_search(&KeywordEmbedder, "anything", 5, 0.0) {
        Err(EngineError::EmbeddingUnavailable(_)) => {}
        other => panic!("expected EmbeddingUnavailable, got {other:?}"),
    }
    // Structural queries are unaffected.
    assert!(engine.stats().nodes == 0);
    assert!(engine.find_nodes_by_name("f", None).is_empty());
}

#[test]
fn vectors_die_with_their_file() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.ts", "export function f() {}\n");
    let (mut engine, _) = init_and_index(&dir);
    engine.embed_all(&KeywordEmbedder).unwrap();
    assert!(engine.stats().vectors > 0);

    std::fs::remove_file(dir.path().join("a.ts")).unwrap();
    engine.sync(&carto_core::cancel::CancelToken::new()).unwrap();
    assert_eq!(engine.stats().vectors, 0);
}
