/// Errors from the parsing layer. Callers contain these per file; none of
/// them aborts a batch.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("grammar error for {language}: {message}")]
    Grammar { language: String, message: String },

    #[error("query compilation error for {language}: {message}")]
    Query { language: String, message: String },

    #[error("parse failed for {0}")]
    ParseFailed(String),
}
