//! Pluggable framework resolvers.
//!
//! A framework resolver is a value detecting one framework's idioms: extra
//! nodes that are not visible as plain syntactic forms (decorator-driven
//! routes), and name lookups the generic resolver passes cannot see.
//! Resolvers are distinct values assembled into an ordered registry; during
//! resolution the first hit wins.

mod express;
mod flask;

pub use express::ExpressRoutes;
pub use flask::FlaskRoutes;

use carto_core::types::{Node, ResolvedTarget, UnresolvedRef};

/// Read-only view of the project a resolver may consult. Resolvers must not
/// mutate state through it.
pub trait FrameworkContext {
    fn read_file(&self, rel_path: &str) -> Option<String>;
    fn file_exists(&self, rel_path: &str) -> bool;
    fn all_files(&self) -> Vec<String>;
    fn nodes_in_file(&self, rel_path: &str) -> Vec<Node>;
}

pub trait Framework: Send + Sync {
    fn name(&self) -> &'static str;

    /// Pure detection, run once per indexing session. Typical signals: a
    /// manifest file, a magic filename, an import of a well-known library.
    fn detect(&self, ctx: &dyn FrameworkContext) -> bool;

    /// Scan one file for framework-specific forms and emit derived nodes
    /// (routes, components).
    fn extract_nodes(&self, rel_path: &str, content: &[u8]) -> Vec<Node>;

    /// Try to resolve one reference with framework knowledge.
    fn resolve(
        &self,
        reference: &UnresolvedRef,
        ctx: &dyn FrameworkContext,
    ) -> Option<ResolvedTarget>;
}

/// Ordered registry of the shipped resolvers.
pub struct FrameworkRegistry {
    frameworks: Vec<Box<dyn Framework>>,
}

impl Default for FrameworkRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl FrameworkRegistry {
    pub fn with_defaults() -> Self {
        Self {
            frameworks: vec![Box::new(FlaskRoutes), Box::new(ExpressRoutes)],
        }
    }

    pub fn empty() -> Self {
        Self { frameworks: vec![] }
    }

    pub fn register(&mut self, framework: Box<dyn Framework>) {
        self.frameworks.push(framework);
    }

    /// Resolvers active for this session: detected against the context, or
    /// force-enabled through config hints.
    pub fn detect_active(
        &self,
        ctx: &dyn FrameworkContext,
        hints: &[String],
    ) -> Vec<&dyn Framework> {
        self.frameworks
            .iter()
            .map(|f| f.as_ref())
            .filter(|f| hints.iter().any(|h| h == f.name()) || f.detect(ctx))
            .collect()
    }

    /// Look up already-detected resolvers by name, preserving registry
    /// order. Detection is pure and runs once per session; later phases
    /// reuse its result through this.
    pub fn by_names(&self, names: &[String]) -> Vec<&dyn Framework> {
        self.frameworks
            .iter()
            .map(|f| f.as_ref())
            .filter(|f| names.iter().any(|n| n == f.name()))
            .collect()
    }
}
