use crate::client::EmbeddingClient;
use crate::error::Result;
use crate::huggingface::HuggingFaceClient;
use crate::ollama::OllamaClient;
use crate::openai::OpenAiClient;
use crate::provider::{EmbeddingConfig, ProviderKind};
use async_trait::async_trait;

/// Match over every variant, binding the inner client
macro_rules! delegate_client {
    ($self:expr, |$c:ident| $expr:expr) => {
        match $self {
            AnyEmbeddingClient::Ollama($c) => $expr,
            AnyEmbeddingClient::OpenAi($c) => $expr,
            AnyEmbeddingClient::HuggingFace($c) => $expr,
        }
    };
}

/// One of the built-in providers, chosen from configuration
#[derive(Debug, Clone)]
pub enum AnyEmbeddingClient {
    /// Serves both `ollama` and `mxbai`
    Ollama(OllamaClient),
    OpenAi(OpenAiClient),
    HuggingFace(HuggingFaceClient),
}

impl AnyEmbeddingClient {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let client = match config.kind {
            ProviderKind::Ollama | ProviderKind::Mxbai => Self::Ollama(OllamaClient::new(config)?),
            ProviderKind::OpenAi => Self::OpenAi(OpenAiClient::new(config)?),
            ProviderKind::HuggingFace => Self::HuggingFace(HuggingFaceClient::new(config)?),
        };
        log::debug!(
            "embedding client: {} ({}, dim {})",
            client.name(),
            client.model(),
            client.dimension()
        );
        Ok(client)
    }
}

#[async_trait]
impl EmbeddingClient for AnyEmbeddingClient {
    fn name(&self) -> &str {
        delegate_client!(self, |c| c.name())
    }

    fn model(&self) -> &str {
        delegate_client!(self, |c| c.model())
    }

    fn dimension(&self) -> usize {
        delegate_client!(self, |c| c.dimension())
    }

    fn max_concurrency(&self) -> usize {
        delegate_client!(self, |c| c.max_concurrency())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        delegate_client!(self, |c| c.embed(text).await)
    }

    async fn embed_batch(&self, texts: &[String]) -> Vec<Result<Vec<f32>>> {
        delegate_client!(self, |c| c.embed_batch(texts).await)
    }

    async fn health_check(&self) -> Result<()> {
        delegate_client!(self, |c| c.health_check().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbeddingError;

    #[test]
    fn local_providers_build_without_credentials() {
        for kind in [ProviderKind::Ollama, ProviderKind::Mxbai] {
            let client = AnyEmbeddingClient::from_config(&EmbeddingConfig::for_kind(kind)).unwrap();
            assert_eq!(client.name(), kind.as_str());
            assert_eq!(client.dimension(), kind.default_dimension());
        }
    }

    #[test]
    fn remote_providers_need_a_key() {
        let config = EmbeddingConfig {
            api_key_env: Some("SEMINDEX_TEST_NO_SUCH_TOKEN".to_string()),
            ..EmbeddingConfig::for_kind(ProviderKind::HuggingFace)
        };
        assert!(matches!(
            AnyEmbeddingClient::from_config(&config),
            Err(EmbeddingError::MissingApiKey { .. })
        ));
    }
}
