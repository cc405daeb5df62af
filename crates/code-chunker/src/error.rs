use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChunkerError>;

#[derive(Error, Debug)]
pub enum ChunkerError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Parse failed for {path}: {reason}")]
    ParseFailed { path: String, reason: String },

    #[error("Tree-sitter language error: {0}")]
    LanguageError(#[from] tree_sitter::LanguageError),

    #[error("Invalid chunker config: {0}")]
    InvalidConfig(String),
}

impl ChunkerError {
    pub fn unsupported_language(name: impl Into<String>) -> Self {
        Self::UnsupportedLanguage(name.into())
    }

    pub fn parse_failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ParseFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Parse failures are absorbed by the line-window fallback.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::ParseFailed { .. } | Self::UnsupportedLanguage(_))
    }
}
