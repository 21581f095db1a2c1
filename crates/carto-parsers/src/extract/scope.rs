//! Scope walking, export rules, and docstring capture.
//!
//! Qualified names are built by walking the chain of enclosing named scopes
//! in the parse tree; export visibility and docstrings follow per-language
//! rules layered on top of the generic extraction.

use tree_sitter::{Node, Tree};

use carto_core::types::SourceRange;

use crate::language::Language;

/// Tree node kinds that open a named scope for qualification purposes.
fn scope_kinds(language: Language) -> &'static [&'static str] {
    match language {
        Language::TypeScript | Language::Tsx | Language::JavaScript => &[
            "class_declaration",
            "interface_declaration",
            "enum_declaration",
            "function_declaration",
            "method_definition",
        ],
        Language::Python => &["class_definition", "function_definition"],
        Language::Rust => &["mod_item", "impl_item", "trait_item", "function_item"],
        Language::Go => &[],
        Language::Java => &[
            "class_declaration",
            "interface_declaration",
            "enum_declaration",
        ],
        Language::C => &[],
        Language::Cpp => &["class_specifier", "struct_specifier", "namespace_definition"],
        Language::CSharp => &[
            "namespace_declaration",
            "class_declaration",
            "struct_declaration",
            "interface_declaration",
        ],
        Language::Php => &[
            "class_declaration",
            "interface_declaration",
            "namespace_definition",
        ],
        Language::Ruby => &["class", "module"],
        Language::Swift | Language::Kotlin => &[],
    }
}

/// Kinds whose members become methods rather than free functions.
pub fn is_class_like_scope(language: Language, kind: &str) -> bool {
    matches!(
        (language, kind),
        (
            Language::TypeScript | Language::Tsx | Language::JavaScript,
            "class_declaration"
        ) | (Language::Python, "class_definition")
            | (Language::Rust, "impl_item" | "trait_item")
            | (Language::Java, "class_declaration" | "enum_declaration")
            | (Language::Cpp, "class_specifier" | "struct_specifier")
            | (Language::CSharp, "class_declaration" | "struct_declaration")
            | (Language::Php, "class_declaration")
            | (Language::Ruby, "class")
    )
}

fn scope_name(node: Node, language: Language, source: &[u8]) -> Option<String> {
    // Rust impl blocks take their scope name from the implemented type.
    let field = match (language, node.kind()) {
        (Language::Rust, "impl_item") => "type",
        _ => "name",
    };
    let name_node = node.child_by_field_name(field)?;
    name_node.utf8_text(source).ok().map(|s| s.to_string())
}

fn node_at_range<'t>(tree: &'t Tree, range: SourceRange) -> Option<Node<'t>> {
    let start = tree_sitter::Point {
        row: range.start_line.saturating_sub(1) as usize,
        column: range.start_col as usize,
    };
    let end = tree_sitter::Point {
        row: range.end_line.saturating_sub(1) as usize,
        column: range.end_col as usize,
    };
    tree.root_node().descendant_for_point_range(start, end)
}

/// Names of the scopes enclosing the definition at `range`, outermost first,
/// plus the tree kind of the innermost enclosing scope (for method/function
/// classification).
pub fn enclosing_scopes(
    tree: &Tree,
    source: &[u8],
    language: Language,
    range: SourceRange,
) -> (Vec<String>, Option<&'static str>) {
    let kinds = scope_kinds(language);
    let mut names = Vec::new();
    let mut innermost_kind = None;

    let Some(start) = node_at_range(tree, range) else {
        return (names, innermost_kind);
    };

    let mut current = start.parent();
    while let Some(node) = current {
        if let Some(kind) = kinds.iter().find(|k| **k == node.kind()) {
            if let Some(name) = scope_name(node, language, source) {
                if innermost_kind.is_none() {
                    innermost_kind = Some(*kind);
                }
                names.push(name);
            }
        }
        current = node.parent();
    }

    names.reverse();
    (names, innermost_kind)
}

/// Language-specific export rule for the definition at `range`.
pub fn is_exported(
    tree: &Tree,
    source: &[u8],
    language: Language,
    range: SourceRange,
    name: &str,
) -> bool {
    match language {
        Language::Python => !name.starts_with('_'),
        Language::Go => name.chars().next().is_some_and(|c| c.is_uppercase()),
        Language::Ruby => true,
        Language::Rust => {
            let Some(node) = node_at_range(tree, range) else {
                return false;
            };
            let mut cursor = node.walk();
            let has_pub = node
                .named_children(&mut cursor)
                .any(|c| c.kind() == "visibility_modifier");
            has_pub
        }
        Language::TypeScript | Language::Tsx | Language::JavaScript => {
            let Some(node) = node_at_range(tree, range) else {
                return false;
            };
            let mut current = node.parent();
            while let Some(n) = current {
                if n.kind() == "export_statement" {
                    return true;
                }
                current = n.parent();
            }
            // Class members are visible whenever the class is.
            node.kind() == "method_definition" || node.kind() == "public_field_definition"
        }
        Language::Java | Language::CSharp | Language::Php => {
            head_line(tree, source, range).contains("public")
        }
        Language::C | Language::Cpp => !head_line(tree, source, range).starts_with("static"),
        Language::Swift | Language::Kotlin => false,
    }
}

fn head_line(tree: &Tree, source: &[u8], range: SourceRange) -> String {
    let Some(node) = node_at_range(tree, range) else {
        return String::new();
    };
    let text = node.utf8_text(source).unwrap_or("");
    text.lines().next().unwrap_or("").trim().to_string()
}

/// Leading documentation for the definition at `range`, where the grammar
/// exposes it: Python docstrings, doc comments immediately above elsewhere.
pub fn docstring(
    tree: &Tree,
    source: &[u8],
    language: Language,
    range: SourceRange,
) -> Option<String> {
    let node = node_at_range(tree, range)?;

    if language == Language::Python {
        let body = node.child_by_field_name("body")?;
        let first = body.named_child(0)?;
        if first.kind() == "expression_statement" {
            let inner = first.named_child(0)?;
            if inner.kind() == "string" {
                let raw = inner.utf8_text(source).ok()?;
                let trimmed = raw
                    .trim_start_matches(['r', 'b', 'f', 'u'])
                    .trim_matches('"')
                    .trim_matches('\'')
                    .trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
        return None;
    }

    // A comment ending on the line directly above counts as documentation.
    let anchor = match node.parent() {
        Some(p) if p.kind() == "export_statement" || p.kind() == "decorated_definition" => p,
        _ => node,
    };
    let prev = anchor.prev_named_sibling()?;
    let kinds = ["comment", "line_comment", "block_comment"];
    if !kinds.contains(&prev.kind()) {
        return None;
    }
    if prev.end_position().row + 1 != anchor.start_position().row {
        return None;
    }
    let raw = prev.utf8_text(source).ok()?;
    let cleaned: String = raw
        .lines()
        .map(|l| {
            l.trim()
                .trim_start_matches("///")
                .trim_start_matches("//")
                .trim_start_matches("/**")
                .trim_start_matches("/*")
                .trim_end_matches("*/")
                .trim_start_matches('*')
                .trim_start_matches('#')
                .trim()
        })
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::ParserPool;

    fn parse(src: &str, lang: Language) -> Tree {
        ParserPool::new().parse(src.as_bytes(), lang).unwrap()
    }

    fn range_of(src: &str, needle: &str) -> SourceRange {
        let offset = src.find(needle).unwrap();
        let line = src[..offset].matches('\n').count() as u32 + 1;
        let col = offset - src[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
        SourceRange {
            start_line: line,
            start_col: col as u32,
            end_line: line,
            end_col: col as u32 + needle.len() as u32,
        }
    }

    #[test]
    fn python_nested_scopes() {
        let src = "class Outer:\n    class Inner:\n        def m(self):\n            pass\n";
        let tree = parse(src, Language::Python);
        let range = range_of(src, "def m(self):");
        let (scopes, inner) = enclosing_scopes(&tree, src.as_bytes(), Language::Python, range);
        assert_eq!(scopes, vec!["Outer", "Inner"]);
        assert_eq!(inner, Some("class_definition"));
    }

    #[test]
    fn rust_impl_scope_uses_target_type() {
        let src = "struct Foo;\nimpl Foo {\n    fn bar(&self) {}\n}\n";
        let tree = parse(src, Language::Rust);
        let range = range_of(src, "fn bar");
        let (scopes, inner) = enclosing_scopes(&tree, src.as_bytes(), Language::Rust, range);
        assert_eq!(scopes, vec!["Foo"]);
        assert!(is_class_like_scope(Language::Rust, inner.unwrap()));
    }

    #[test]
    fn python_underscore_names_are_private() {
        let src = "def _hidden():\n    pass\n";
        let tree = parse(src, Language::Python);
        let range = range_of(src, "def _hidden():");
        assert!(!is_exported(
            &tree,
            src.as_bytes(),
            Language::Python,
            range,
            "_hidden"
        ));
    }

    #[test]
    fn go_export_follows_capitalization() {
        let src = "package p\nfunc Public() {}\nfunc private() {}\n";
        let tree = parse(src, Language::Go);
        let range = range_of(src, "func Public()");
        assert!(is_exported(&tree, src.as_bytes(), Language::Go, range, "Public"));
        assert!(!is_exported(&tree, src.as_bytes(), Language::Go, range, "private"));
    }

    #[test]
    fn rust_pub_visibility() {
        let src = "pub fn shown() {}\nfn hidden() {}\n";
        let tree = parse(src, Language::Rust);
        let shown = range_of(src, "pub fn shown() {}");
        assert!(is_exported(&tree, src.as_bytes(), Language::Rust, shown, "shown"));
        let hidden = range_of(src, "fn hidden() {}");
        assert!(!is_exported(&tree, src.as_bytes(), Language::Rust, hidden, "hidden"));
    }

    #[test]
    fn typescript_export_statement() {
        let src = "export function f() {}\nfunction g() {}\n";
        let tree = parse(src, Language::TypeScript);
        // Ranges here point at the inner function_declaration, as the
        // extractor's def captures do.
        let f = range_of(src, "function f() {}");
        assert!(is_exported(&tree, src.as_bytes(), Language::TypeScript, f, "f"));
        let g = range_of(src, "function g() {}");
        assert!(!is_exported(&tree, src.as_bytes(), Language::TypeScript, g, "g"));
    }

    #[test]
    fn python_docstring_is_captured() {
        let src = "def f():\n    \"\"\"Adds one.\"\"\"\n    return 1\n";
        let tree = parse(src, Language::Python);
        let range = range_of(src, "def f():");
        let doc = docstring(&tree, src.as_bytes(), Language::Python, range);
        assert_eq!(doc.as_deref(), Some("Adds one."));
    }

    #[test]
    fn rust_doc_comment_is_captured() {
        let src = "/// Greets the caller.\nfn greet() {}\n";
        let tree = parse(src, Language::Rust);
        let range = range_of(src, "fn greet() {}");
        let doc = docstring(&tree, src.as_bytes(), Language::Rust, range);
        assert_eq!(doc.as_deref(), Some("Greets the caller."));
    }
}
