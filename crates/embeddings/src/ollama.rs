use crate::client::{check_dimension, truncate_chars, EmbeddingClient};
use crate::error::{EmbeddingError, Result};
use crate::http;
use crate::provider::{EmbeddingConfig, ProviderKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

/// Local Ollama service (`nomic-embed-text`, `mxbai-embed-large`)
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    kind: ProviderKind,
    base_url: String,
    model: String,
    dimension: usize,
    max_concurrency: usize,
}

impl OllamaClient {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: http::build_client(config.timeout())?,
            kind: config.kind,
            base_url: config.base_url(),
            model: config.model().to_string(),
            dimension: config.dimension(),
            max_concurrency: config.max_concurrency,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn model_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted
        || installed
            .strip_prefix(wanted)
            .is_some_and(|tag| tag.starts_with(':'))
}

#[async_trait]
impl EmbeddingClient for OllamaClient {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = EmbeddingRequest {
            model: &self.model,
            prompt: truncate_chars(text, self.kind.max_input_chars()),
        };
        let request = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&body);
        let response: EmbeddingResponse = http::send_json(self.name(), request).await?;
        if response.embedding.is_empty() {
            return Err(EmbeddingError::invalid_response(self.name(), "empty embedding"));
        }
        check_dimension(self.dimension, response.embedding)
    }

    async fn health_check(&self) -> Result<()> {
        let request = self.client.get(format!("{}/api/tags", self.base_url));
        let tags: TagsResponse = http::send_json(self.name(), request).await?;
        if tags.models.iter().any(|m| model_matches(&m.name, &self.model)) {
            Ok(())
        } else {
            Err(EmbeddingError::unavailable(
                self.name(),
                format!("model '{}' is not pulled (run: ollama pull {})", self.model, self.model),
            ))
        }
    }
}
