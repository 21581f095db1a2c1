//! Query engine: runs a language's pattern set over a parse tree and yields
//! captures grouped by match, in source order.

use streaming_iterator::StreamingIterator;
use tree_sitter::{QueryCursor, Tree};

use carto_core::types::SourceRange;

use crate::error::ParseError;
use crate::language::Language;
use crate::queries;

/// One named subtree extracted by a pattern.
#[derive(Debug, Clone)]
pub struct Capture {
    pub name: String,
    pub range: SourceRange,
    pub text: String,
}

/// All captures of one pattern match.
#[derive(Debug, Clone)]
pub struct MatchCaptures {
    pub captures: Vec<Capture>,
}

impl MatchCaptures {
    /// First capture with the exact name.
    pub fn get(&self, name: &str) -> Option<&Capture> {
        self.captures.iter().find(|c| c.name == name)
    }
}

pub(crate) fn node_range(node: tree_sitter::Node) -> SourceRange {
    SourceRange {
        start_line: node.start_position().row as u32 + 1,
        start_col: node.start_position().column as u32,
        end_line: node.end_position().row as u32 + 1,
        end_col: node.end_position().column as u32,
    }
}

/// Run the language's pattern set over a tree and collect grouped captures.
pub fn run_queries(
    tree: &Tree,
    source: &[u8],
    language: Language,
) -> Result<Vec<MatchCaptures>, ParseError> {
    let query = queries::query_for_language(language)?;
    let capture_names = query.capture_names();

    let mut cursor = QueryCursor::new();
    let mut out = Vec::new();
    let mut matches = cursor.matches(&query, tree.root_node(), source);
    while let Some(m) = matches.next() {
        let captures = m
            .captures
            .iter()
            .map(|cap| Capture {
                name: capture_names[cap.index as usize].to_string(),
                range: node_range(cap.node),
                text: cap.node.utf8_text(source).unwrap_or("").to_string(),
            })
            .collect();
        out.push(MatchCaptures { captures });
    }

    // QueryCursor yields matches in pattern order within a node; normalize
    // to source order so downstream consumers see captures as written.
    out.sort_by_key(|m| {
        m.captures
            .first()
            .map(|c| (c.range.start_line, c.range.start_col))
            .unwrap_or((0, 0))
    });
    Ok(out)
}
