//! Read-only framework context backed by the project root and the store.

use std::path::{Path, PathBuf};

use carto_core::store::SymbolStore;
use carto_core::types::Node;
use carto_parsers::frameworks::FrameworkContext;

pub struct StoreContext<'a> {
    root: PathBuf,
    store: &'a dyn SymbolStore,
}

impl<'a> StoreContext<'a> {
    pub fn new(root: &Path, store: &'a dyn SymbolStore) -> Self {
        Self {
            root: root.to_path_buf(),
            store,
        }
    }
}

impl FrameworkContext for StoreContext<'_> {
    fn read_file(&self, rel_path: &str) -> Option<String> {
        let abs = carto_core::paths::validate_under_root(&self.root, Path::new(rel_path)).ok()?;
        std::fs::read_to_string(abs).ok()
    }

    fn file_exists(&self, rel_path: &str) -> bool {
        carto_core::paths::validate_under_root(&self.root, Path::new(rel_path))
            .map(|abs| abs.is_file())
            .unwrap_or(false)
    }

    fn all_files(&self) -> Vec<String> {
        self.store
            .get_all_files()
            .into_iter()
            .map(|f| f.path)
            .collect()
    }

    fn nodes_in_file(&self, rel_path: &str) -> Vec<Node> {
        self.store.get_nodes_by_file(rel_path)
    }
}
