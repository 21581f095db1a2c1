//! Candidate file enumeration for indexing and sync.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;

use crate::language::{detect_language, Language};

pub struct WalkEntry {
    pub path: PathBuf,
    /// Relative forward-slash path, the store key.
    pub rel_path: String,
    pub language: Language,
    pub size: u64,
}

pub struct FileWalker {
    root: PathBuf,
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
    languages: Vec<Language>,
}

fn build_globset(patterns: &[String]) -> Option<GlobSet> {
    if patterns.is_empty() {
        return None;
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => {
                tracing::warn!(pattern, error = %e, "ignoring invalid glob pattern");
            }
        }
    }
    builder.build().ok()
}

impl FileWalker {
    /// Creates a walker rooted at the given directory, filtered by the
    /// config's include/exclude globs and enabled languages (empty = all).
    pub fn new(root: &Path, include: &[String], exclude: &[String], languages: &[String]) -> Self {
        Self {
            root: root.to_path_buf(),
            include: build_globset(include),
            exclude: build_globset(exclude),
            languages: languages
                .iter()
                .filter_map(|tag| Language::from_tag(tag))
                .collect(),
        }
    }

    fn language_enabled(&self, language: Language) -> bool {
        if self.languages.is_empty() {
            return true;
        }
        self.languages.iter().any(|l| l.tag() == language.tag())
    }

    /// Walks the root and returns all recognized source files, respecting
    /// gitignore and `.cartoignore`, in stable path order.
    pub fn walk(&self) -> Vec<WalkEntry> {
        let mut entries = Vec::new();

        let walker = WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .add_custom_ignore_filename(".cartoignore")
            .build();

        for result in walker {
            let entry = match result {
                Ok(e) => e,
                Err(_) => continue,
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            let path = entry.into_path();
            let rel_path = carto_core::paths::store_key(&self.root, &path);

            if let Some(include) = &self.include {
                if !include.is_match(&rel_path) {
                    continue;
                }
            }
            if let Some(exclude) = &self.exclude {
                if exclude.is_match(&rel_path) {
                    continue;
                }
            }

            let Some(language) = detect_language(&path) else {
                continue;
            };
            if !self.language_enabled(language) {
                continue;
            }

            let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            entries.push(WalkEntry {
                path,
                rel_path,
                language,
                size,
            });
        }

        entries.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        entries
    }
}
