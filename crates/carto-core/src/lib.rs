//! Core types, graph storage, and configuration for carto.
//!
//! This crate provides the foundational data structures used across all
//! carto crates:
//! - [`types`] — Graph nodes, edges, file records, and summaries
//! - [`store`] — The [`SymbolStore`](store::SymbolStore) trait for graph persistence
//! - [`sqlite`] — SQLite-backed implementation of `SymbolStore`
//! - [`config`] — Configuration loading from `.carto/config.json`
//! - [`ids`] — Deterministic node IDs and content hashes (base62 of xxhash64)
//! - [`lock`] — Single-writer advisory lock with stale reclamation
//! - [`paths`] — Project-root path validation
//! - [`cancel`] — Cooperative cancellation token

pub mod cancel;
pub mod config;
pub mod error;
pub mod ids;
pub mod lock;
pub mod paths;
pub mod sqlite;
pub mod sqlite_queries;
pub mod store;
pub mod types;

/// Name of the project directory carto owns under the project root.
pub const CARTO_DIR: &str = ".carto";

/// Name of the store database inside the project directory.
pub const DB_FILE: &str = "graph.db";
