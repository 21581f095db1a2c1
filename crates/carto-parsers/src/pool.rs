//! Parser pool: one cached parser per language, process lifetime.
//!
//! Grammars are immutable and shared; parser instances are checked out for
//! the duration of a single file's parse, so extraction can run on rayon
//! worker threads without contention on one shared parser.

use std::collections::HashMap;
use std::sync::Mutex;

use tree_sitter::{Parser, Tree};

use crate::error::ParseError;
use crate::language::Language;

/// The grammar backing a language, shared for the process lifetime.
pub fn grammar(language: Language) -> Result<tree_sitter::Language, ParseError> {
    let lang = match language {
        // JavaScript is a syntactic subset of TypeScript; one grammar covers both.
        Language::TypeScript | Language::JavaScript => {
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
        }
        Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        Language::Python => tree_sitter_python::LANGUAGE.into(),
        Language::Go => tree_sitter_go::LANGUAGE.into(),
        Language::Rust => tree_sitter_rust::LANGUAGE.into(),
        Language::Java => tree_sitter_java::LANGUAGE.into(),
        Language::C => tree_sitter_c::LANGUAGE.into(),
        Language::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        Language::CSharp => tree_sitter_c_sharp::LANGUAGE.into(),
        Language::Php => tree_sitter_php::LANGUAGE_PHP.into(),
        Language::Ruby => tree_sitter_ruby::LANGUAGE.into(),
        Language::Swift | Language::Kotlin => {
            return Err(ParseError::UnsupportedLanguage(language.tag().to_string()))
        }
    };
    Ok(lang)
}

/// The key a parser is cached under. TSX needs its own parser even though
/// it shares the TypeScript tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum GrammarKey {
    TypeScript,
    Tsx,
    Python,
    Go,
    Rust,
    Java,
    C,
    Cpp,
    CSharp,
    Php,
    Ruby,
}

impl GrammarKey {
    pub(crate) fn for_language(language: Language) -> Result<Self, ParseError> {
        match language {
            Language::TypeScript | Language::JavaScript => Ok(GrammarKey::TypeScript),
            Language::Tsx => Ok(GrammarKey::Tsx),
            Language::Python => Ok(GrammarKey::Python),
            Language::Go => Ok(GrammarKey::Go),
            Language::Rust => Ok(GrammarKey::Rust),
            Language::Java => Ok(GrammarKey::Java),
            Language::C => Ok(GrammarKey::C),
            Language::Cpp => Ok(GrammarKey::Cpp),
            Language::CSharp => Ok(GrammarKey::CSharp),
            Language::Php => Ok(GrammarKey::Php),
            Language::Ruby => Ok(GrammarKey::Ruby),
            Language::Swift | Language::Kotlin => {
                Err(ParseError::UnsupportedLanguage(language.tag().to_string()))
            }
        }
    }
}

/// Pool of initialized parsers keyed by grammar.
#[derive(Default)]
pub struct ParserPool {
    idle: Mutex<HashMap<GrammarKey, Vec<Parser>>>,
}

impl ParserPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn checkout(&self, language: Language) -> Result<(GrammarKey, Parser), ParseError> {
        let key = GrammarKey::for_language(language)?;
        if let Some(parser) = self
            .idle
            .lock()
            .expect("parser pool poisoned")
            .get_mut(&key)
            .and_then(Vec::pop)
        {
            return Ok((key, parser));
        }

        let mut parser = Parser::new();
        parser
            .set_language(&grammar(language)?)
            .map_err(|e| ParseError::Grammar {
                language: language.tag().to_string(),
                message: e.to_string(),
            })?;
        Ok((key, parser))
    }

    fn put_back(&self, key: GrammarKey, parser: Parser) {
        self.idle
            .lock()
            .expect("parser pool poisoned")
            .entry(key)
            .or_default()
            .push(parser);
    }

    /// Parse one file's content. The returned tree is ephemeral: callers
    /// must not retain it past the extraction of that file.
    pub fn parse(&self, content: &[u8], language: Language) -> Result<Tree, ParseError> {
        let (key, mut parser) = self.checkout(language)?;
        let tree = parser.parse(content, None);
        self.put_back(key, parser);
        tree.ok_or_else(|| ParseError::ParseFailed(language.tag().to_string()))
    }
}
