//! The closed extension → language table.

use std::path::Path;

/// Supported languages. The extension mapping below is a closed table;
/// adding a language means extending it, registering a grammar in the pool,
/// and supplying a pattern set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    TypeScript,
    /// `.tsx`: same language tag as TypeScript, parsed with the TSX grammar.
    Tsx,
    JavaScript,
    Python,
    Go,
    Rust,
    Java,
    C,
    Cpp,
    CSharp,
    Php,
    Ruby,
    Swift,
    Kotlin,
}

impl Language {
    /// The language tag stored on nodes and file records.
    pub fn tag(&self) -> &'static str {
        match self {
            Language::TypeScript | Language::Tsx => "typescript",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Php => "php",
            Language::Ruby => "ruby",
            Language::Swift => "swift",
            Language::Kotlin => "kotlin",
        }
    }

    /// Separator used when joining enclosing scopes into a qualified name.
    pub fn separator(&self) -> &'static str {
        match self {
            Language::Rust | Language::Cpp | Language::Php => "::",
            _ => ".",
        }
    }

    /// Whether a grammar is registered in the parser pool. Detected-but-
    /// unsupported languages surface `LanguageUnsupported` warnings.
    pub fn has_grammar(&self) -> bool {
        !matches!(self, Language::Swift | Language::Kotlin)
    }

    /// Look up a language tag (as stored in config `languages`).
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "typescript" => Some(Language::TypeScript),
            "javascript" => Some(Language::JavaScript),
            "python" => Some(Language::Python),
            "go" => Some(Language::Go),
            "rust" => Some(Language::Rust),
            "java" => Some(Language::Java),
            "c" => Some(Language::C),
            "cpp" => Some(Language::Cpp),
            "csharp" => Some(Language::CSharp),
            "php" => Some(Language::Php),
            "ruby" => Some(Language::Ruby),
            "swift" => Some(Language::Swift),
            "kotlin" => Some(Language::Kotlin),
            _ => None,
        }
    }
}

/// Map a file extension to its language. `.h` defaults to C.
pub fn detect_language(path: &Path) -> Option<Language> {
    match path.extension()?.to_str()? {
        "ts" => Some(Language::TypeScript),
        "tsx" => Some(Language::Tsx),
        "js" | "mjs" | "cjs" => Some(Language::JavaScript),
        "jsx" => Some(Language::Tsx),
        "py" | "pyw" => Some(Language::Python),
        "go" => Some(Language::Go),
        "rs" => Some(Language::Rust),
        "java" => Some(Language::Java),
        "c" | "h" => Some(Language::C),
        "cpp" | "cc" | "cxx" | "hpp" | "hxx" => Some(Language::Cpp),
        "cs" => Some(Language::CSharp),
        "php" => Some(Language::Php),
        "rb" | "rake" => Some(Language::Ruby),
        "swift" => Some(Language::Swift),
        "kt" | "kts" => Some(Language::Kotlin),
        _ => None,
    }
}
