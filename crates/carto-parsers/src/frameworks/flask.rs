//! Flask route detection.
//!
//! Routes are declared through decorators (`@app.route("/users")`), which
//! generic extraction sees only as a call. This resolver emits the route
//! nodes and links the registration calls back to them.

use std::sync::OnceLock;

use regex::Regex;

use carto_core::ids::node_id;
use carto_core::types::{Node, NodeKind, RefKind, ResolvedTarget, SourceRange, UnresolvedRef};

use super::{Framework, FrameworkContext};
use crate::language::{detect_language, Language};

const MANIFESTS: &[&str] = &["requirements.txt", "pyproject.toml", "Pipfile"];

fn route_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"@(\w+)\.route\(\s*["']([^"']+)["'](?:.*methods\s*=\s*\[\s*["'](\w+)["'])?"#)
            .expect("flask route pattern is valid")
    })
}

pub struct FlaskRoutes;

impl Framework for FlaskRoutes {
    fn name(&self) -> &'static str {
        "flask"
    }

    fn detect(&self, ctx: &dyn FrameworkContext) -> bool {
        MANIFESTS.iter().any(|manifest| {
            ctx.read_file(manifest)
                .is_some_and(|content| content.to_lowercase().contains("flask"))
        })
    }

    fn extract_nodes(&self, rel_path: &str, content: &[u8]) -> Vec<Node> {
        if detect_language(std::path::Path::new(rel_path)) != Some(Language::Python) {
            return Vec::new();
        }
        let Ok(text) = std::str::from_utf8(content) else {
            return Vec::new();
        };

        let mut nodes = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let Some(caps) = route_pattern().captures(line) else {
                continue;
            };
            let path = caps.get(2).map(|m| m.as_str()).unwrap_or("/");
            let method = caps
                .get(3)
                .map(|m| m.as_str().to_uppercase())
                .unwrap_or_else(|| "GET".to_string());
            let qualified = format!("{method} {path}");
            let line_no = idx as u32 + 1;
            nodes.push(Node {
                id: node_id(NodeKind::Route, rel_path, &qualified, line_no),
                kind: NodeKind::Route,
                name: path.to_string(),
                qualified_name: qualified,
                language: "python".to_string(),
                file_path: rel_path.to_string(),
                range: SourceRange {
                    start_line: line_no,
                    start_col: 0,
                    end_line: line_no,
                    end_col: line.len() as u32,
                },
                signature: Some(line.trim().to_string()),
                docstring: None,
                is_exported: true,
                updated_at: 0,
            });
        }
        nodes
    }

    fn resolve(
        &self,
        reference: &UnresolvedRef,
        ctx: &dyn FrameworkContext,
    ) -> Option<ResolvedTarget> {
        // The decorator's registration call resolves to the route node it
        // declared on the same line.
        if reference.kind != RefKind::Call || reference.name != "route" {
            return None;
        }
        reference.qualifier.as_deref()?;
        let route = ctx
            .nodes_in_file(&reference.file_path)
            .into_iter()
            .find(|n| n.kind == NodeKind::Route && n.range.start_line == reference.line)?;
        Some(ResolvedTarget {
            target_node_id: route.id,
            confidence: 0.85,
            resolved_by: "framework:flask",
        })
    }
}
