//! Express route detection for JavaScript/TypeScript projects.

use std::sync::OnceLock;

use regex::Regex;

use carto_core::ids::node_id;
use carto_core::types::{Node, NodeKind, RefKind, ResolvedTarget, SourceRange, UnresolvedRef};

use super::{Framework, FrameworkContext};
use crate::language::{detect_language, Language};

const VERBS: &[&str] = &["get", "post", "put", "delete", "patch", "all"];

fn route_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\b(app|router)\.(get|post|put|delete|patch|all)\(\s*["'`]([^"'`]+)["'`]"#)
            .expect("express route pattern is valid")
    })
}

pub struct ExpressRoutes;

impl Framework for ExpressRoutes {
    fn name(&self) -> &'static str {
        "express"
    }

    fn detect(&self, ctx: &dyn FrameworkContext) -> bool {
        let Some(manifest) = ctx.read_file("package.json") else {
            return false;
        };
        let Ok(json) = serde_json::from_str::<serde_json::Value>(&manifest) else {
            return false;
        };
        ["dependencies", "devDependencies"]
            .iter()
            .any(|key| json.get(key).and_then(|deps| deps.get("express")).is_some())
    }

    fn extract_nodes(&self, rel_path: &str, content: &[u8]) -> Vec<Node> {
        let lang = detect_language(std::path::Path::new(rel_path));
        if !matches!(
            lang,
            Some(Language::TypeScript | Language::Tsx | Language::JavaScript)
        ) {
            return Vec::new();
        }
        let Ok(text) = std::str::from_utf8(content) else {
            return Vec::new();
        };
        let tag = lang.map(|l| l.tag()).unwrap_or("javascript");

        let mut nodes = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let Some(caps) = route_pattern().captures(line) else {
                continue;
            };
            let method = caps[2].to_uppercase();
            let path = caps[3].to_string();
            let qualified = format!("{method} {path}");
            let line_no = idx as u32 + 1;
            nodes.push(Node {
                id: node_id(NodeKind::Route, rel_path, &qualified, line_no),
                kind: NodeKind::Route,
                name: path,
                qualified_name: qualified,
                language: tag.to_string(),
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
        if reference.kind != RefKind::Call {
            return None;
        }
        if !VERBS.contains(&reference.name.as_str()) {
            return None;
        }
        if !matches!(reference.qualifier.as_deref(), Some("app") | Some("router")) {
            return None;
        }
        let route = ctx
            .nodes_in_file(&reference.file_path)
            .into_iter()
            .find(|n| n.kind == NodeKind::Route && n.range.start_line == reference.line)?;
        Some(ResolvedTarget {
            target_node_id: route.id,
            confidence: 0.85,
            resolved_by: "framework:express",
        })
    }
}
