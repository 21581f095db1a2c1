//! Per-language pattern sets, compiled once per process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use tree_sitter::Query;

use crate::error::ParseError;
use crate::language::Language;
use crate::pool::{self, GrammarKey};

pub const TYPESCRIPT_QUERIES: &str = include_str!("typescript.scm");
pub const PYTHON_QUERIES: &str = include_str!("python.scm");
pub const GO_QUERIES: &str = include_str!("go.scm");
pub const RUST_QUERIES: &str = include_str!("rust.scm");
pub const JAVA_QUERIES: &str = include_str!("java.scm");
pub const C_QUERIES: &str = include_str!("c.scm");
pub const CPP_QUERIES: &str = include_str!("cpp.scm");
pub const CSHARP_QUERIES: &str = include_str!("csharp.scm");
pub const PHP_QUERIES: &str = include_str!("php.scm");
pub const RUBY_QUERIES: &str = include_str!("ruby.scm");

fn query_source(key: GrammarKey) -> &'static str {
    match key {
        GrammarKey::TypeScript | GrammarKey::Tsx => TYPESCRIPT_QUERIES,
        GrammarKey::Python => PYTHON_QUERIES,
        GrammarKey::Go => GO_QUERIES,
        GrammarKey::Rust => RUST_QUERIES,
        GrammarKey::Java => JAVA_QUERIES,
        GrammarKey::C => C_QUERIES,
        GrammarKey::Cpp => CPP_QUERIES,
        GrammarKey::CSharp => CSHARP_QUERIES,
        GrammarKey::Php => PHP_QUERIES,
        GrammarKey::Ruby => RUBY_QUERIES,
    }
}

fn cache() -> &'static Mutex<HashMap<GrammarKey, Arc<Query>>> {
    static CACHE: OnceLock<Mutex<HashMap<GrammarKey, Arc<Query>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Compile (or fetch the cached) pattern set for a language. A broken
/// pattern file degrades its language to a contained error; other languages
/// are unaffected.
pub fn query_for_language(language: Language) -> Result<Arc<Query>, ParseError> {
    let key = GrammarKey::for_language(language)?;
    if let Some(q) = cache().lock().expect("query cache poisoned").get(&key) {
        return Ok(Arc::clone(q));
    }

    let grammar = pool::grammar(language)?;
    let query = Query::new(&grammar, query_source(key)).map_err(|e| ParseError::Query {
        language: language.tag().to_string(),
        message: e.to_string(),
    })?;
    let query = Arc::new(query);
    cache()
        .lock()
        .expect("query cache poisoned")
        .insert(key, Arc::clone(&query));
    Ok(query)
}
