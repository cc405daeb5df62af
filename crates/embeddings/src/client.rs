use crate::error::{EmbeddingError, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};

/// Turns text into fixed-length vectors.
///
/// Implementations must report failures as [`EmbeddingError`]; providers that are
/// down surface as [`EmbeddingError::Unavailable`] so callers can retry later.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Provider name (`ollama`, `openai`, ...)
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// Length of every vector this client returns
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts; one result per input, in input order.
    ///
    /// The default runs at most [`max_concurrency`](Self::max_concurrency) single
    /// requests at a time.
    async fn embed_batch(&self, texts: &[String]) -> Vec<Result<Vec<f32>>> {
        let pending: Vec<_> = texts.iter().map(|text| self.embed(text)).collect();
        stream::iter(pending)
            .buffered(self.max_concurrency().max(1))
            .collect()
            .await
    }

    fn max_concurrency(&self) -> usize {
        4
    }

    /// Cheap probe that the backend is reachable and serves the model
    async fn health_check(&self) -> Result<()>;
}

/// Cut `text` to at most `max_chars` characters
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Reject vectors whose length differs from the advertised dimension
pub fn check_dimension(expected: usize, vector: Vec<f32>) -> Result<Vec<f32>> {
    if vector.len() == expected {
        Ok(vector)
    } else {
        Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: vector.len(),
        })
    }
}
