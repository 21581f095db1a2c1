use std::fs;
use std::path::Path;

use carto_core::cancel::CancelToken;
use carto_core::types::IndexSummary;
use carto_engine::Engine;
use tempfile::TempDir;

/// Write a file under the project root, creating parent directories.
pub fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Initialize and fully index a project directory.
pub fn init_and_index(dir: &TempDir) -> (Engine, IndexSummary) {
    let mut engine = Engine::init(dir.path()).expect("init");
    let summary = engine.index_all(&CancelToken::new()).expect("index");
    (engine, summary)
}
