use semindex_code_chunker::ChunkerError;
use semindex_embeddings::EmbeddingError;
use semindex_vector_store::VectorStoreError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Chunker error: {0}")]
    Chunker(#[from] ChunkerError),

    #[error("Embedding error: {0}")]
    Embedding(EmbeddingError),

    #[error("embedding provider {provider} unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    #[error("Vector store error: {0}")]
    VectorStore(VectorStoreError),

    #[error("store busy: lock {path} not acquired within {waited_ms}ms")]
    StoreLockTimeout { path: PathBuf, waited_ms: u64 },

    #[error("failed to extract {path}: {reason}")]
    Extraction { path: String, reason: String },

    #[error("Watcher error: {0}")]
    Watcher(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid project path: {0}")]
    InvalidPath(String),
}

impl IndexerError {
    pub fn extraction(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Extraction {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether a later pass (or a retry by the caller) can succeed without intervention
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(_)
            | Self::ProviderUnavailable { .. }
            | Self::StoreLockTimeout { .. }
            | Self::Extraction { .. }
            | Self::Watcher(_) => true,
            Self::Embedding(err) => err.is_recoverable(),
            Self::VectorStore(err) => err.is_recoverable(),
            Self::Chunker(err) => err.is_recoverable(),
            Self::Config(_) | Self::InvalidPath(_) => false,
        }
    }
}

impl From<EmbeddingError> for IndexerError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::Unavailable { provider, reason } => {
                Self::ProviderUnavailable { provider, reason }
            }
            other => Self::Embedding(other),
        }
    }
}

impl From<VectorStoreError> for IndexerError {
    fn from(err: VectorStoreError) -> Self {
        match err {
            VectorStoreError::LockTimeout { path, waited_ms } => {
                Self::StoreLockTimeout { path, waited_ms }
            }
            other => Self::VectorStore(other),
        }
    }
}

impl From<notify::Error> for IndexerError {
    fn from(err: notify::Error) -> Self {
        Self::Watcher(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_provider_is_lifted() {
        let err: IndexerError = EmbeddingError::unavailable("ollama", "connection refused").into();
        assert!(matches!(err, IndexerError::ProviderUnavailable { ref provider, .. } if provider == "ollama"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn lock_timeout_is_lifted() {
        let err: IndexerError = VectorStoreError::LockTimeout {
            path: PathBuf::from("/tmp/.store.lock"),
            waited_ms: 30,
        }
        .into();
        assert!(matches!(err, IndexerError::StoreLockTimeout { waited_ms: 30, .. }));
        assert!(err.to_string().starts_with("store busy"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn configuration_errors_are_fatal() {
        assert!(!IndexerError::Config("bad".to_string()).is_recoverable());
        let rejected: IndexerError = EmbeddingError::Rejected {
            provider: "openai".to_string(),
            status: 401,
            body: "unauthorized".to_string(),
        }
        .into();
        assert!(!rejected.is_recoverable());
    }
}
