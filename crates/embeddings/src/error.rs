use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Embedding failures.
///
/// Errors carry only owned strings so one failure can be fanned out to every item
/// of a batch request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingError {
    #[error("{provider} unavailable: {reason}")]
    Unavailable { provider: String, reason: String },

    #[error("{provider} rejected request (HTTP {status}): {body}")]
    Rejected {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider} returned an invalid response: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{provider} requires an API key in ${env}")]
    MissingApiKey { provider: String, env: String },

    #[error("Invalid embedding config: {0}")]
    InvalidConfig(String),
}

impl EmbeddingError {
    pub fn unavailable(provider: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unavailable {
            provider: provider.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_response(provider: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            reason: reason.to_string(),
        }
    }

    /// Worth retrying on a later pass: the service is down, overloaded or rate limiting.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::Unavailable { .. } => true,
            Self::Rejected { status, .. } => *status == 429 || *status == 408,
            _ => false,
        }
    }
}
