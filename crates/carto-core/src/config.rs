//! Project configuration for carto.
//!
//! Reads `.carto/config.json` and provides typed access to all settings.
//! Falls back to sensible defaults when the config file is missing or
//! incomplete. Writes are atomic: serialize to a temp file in the same
//! directory, then rename over the target.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Current config schema version.
pub const CONFIG_VERSION: u32 = 1;

/// Name of the config document inside the project directory.
pub const CONFIG_FILE: &str = "config.json";

/// Top-level carto configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub version: u32,
    /// Human label; does not affect indexing.
    #[serde(default)]
    pub project_name: String,
    /// Enabled languages; empty means all supported, auto-detected.
    #[serde(default)]
    pub languages: Vec<String>,
    /// Glob patterns for file selection.
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Framework hints; enables matching resolvers even when detection is
    /// ambiguous.
    #[serde(default)]
    pub frameworks: Vec<String>,
    /// Files larger than this many bytes are skipped.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_true")]
    pub enable_embeddings: bool,
}

fn default_true() -> bool {
    true
}

fn default_max_file_size() -> u64 {
    1024 * 1024
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            project_name: String::new(),
            languages: vec![],
            include: vec![],
            exclude: vec![],
            frameworks: vec![],
            max_file_size: default_max_file_size(),
            enable_embeddings: true,
        }
    }
}

impl ProjectConfig {
    /// Load configuration from `config.json` inside the given carto
    /// directory. Returns defaults if the file doesn't exist or can't be
    /// parsed.
    pub fn load(carto_dir: &Path) -> Self {
        let config_path = carto_dir.join(CONFIG_FILE);
        let content = match std::fs::read_to_string(&config_path) {
            Ok(c) => c,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&content) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(
                    path = %config_path.display(),
                    error = %e,
                    "failed to parse config, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Persist atomically: write a temp file in the same directory, flush,
    /// then rename over the target. No `.tmp` remnants on success.
    pub fn save(&self, carto_dir: &Path) -> Result<(), StoreError> {
        let target = carto_dir.join(CONFIG_FILE);
        let tmp = carto_dir.join(format!("{CONFIG_FILE}.tmp.{}", std::process::id()));

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| StoreError::Integrity(format!("config serialization: {e}")))?;

        let mut file =
            std::fs::File::create(&tmp).map_err(|e| StoreError::io(&tmp, &e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| StoreError::io(&tmp, &e))?;
        file.sync_all().map_err(|e| StoreError::io(&tmp, &e))?;
        drop(file);

        std::fs::rename(&tmp, &target).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            StoreError::io(&target, &e)
        })?;
        Ok(())
    }
}
