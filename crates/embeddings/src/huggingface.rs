use crate::client::{check_dimension, truncate_chars, EmbeddingClient};
use crate::error::{EmbeddingError, Result};
use crate::http;
use crate::provider::{EmbeddingConfig, ProviderKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

const PROVIDER: &str = "huggingface";

#[derive(Debug, Serialize)]
struct FeatureRequest<'a> {
    inputs: Vec<&'a str>,
    options: serde_json::Value,
}

/// The feature-extraction pipeline answers with either a flat vector or one
/// vector per input
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeatureResponse {
    Batch(Vec<Vec<f32>>),
    Single(Vec<f32>),
}

impl FeatureResponse {
    fn into_vectors(self) -> Vec<Vec<f32>> {
        match self {
            Self::Batch(vectors) => vectors,
            Self::Single(vector) => vec![vector],
        }
    }
}

/// Hugging Face Inference API (`pipeline/feature-extraction`)
#[derive(Clone)]
pub struct HuggingFaceClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
    model: String,
    dimension: usize,
}

impl fmt::Debug for HuggingFaceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HuggingFaceClient")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl HuggingFaceClient {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: http::build_client(config.timeout())?,
            token: config.api_key()?,
            base_url: config.base_url(),
            model: config.model().to_string(),
            dimension: config.dimension(),
        })
    }

    async fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let body = FeatureRequest {
            inputs: texts
                .iter()
                .map(|t| truncate_chars(t, ProviderKind::HuggingFace.max_input_chars()))
                .collect(),
            options: json!({ "wait_for_model": true }),
        };
        let request = self
            .client
            .post(format!(
                "{}/pipeline/feature-extraction/{}",
                self.base_url, self.model
            ))
            .bearer_auth(&self.token)
            .json(&body);
        let response: FeatureResponse = http::send_json(PROVIDER, request).await?;
        let vectors = response.into_vectors();
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::invalid_response(
                PROVIDER,
                format!("expected {} embeddings, got {}", texts.len(), vectors.len()),
            ));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingClient for HuggingFaceClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self
            .request(&[text])
            .await?
            .pop()
            .ok_or_else(|| EmbeddingError::invalid_response(PROVIDER, "empty response"))?;
        check_dimension(self.dimension, vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Vec<Result<Vec<f32>>> {
        if texts.is_empty() {
            return Vec::new();
        }
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        match self.request(&refs).await {
            Ok(vectors) => vectors
                .into_iter()
                .map(|v| check_dimension(self.dimension, v))
                .collect(),
            Err(err) => vec![Err(err); texts.len()],
        }
    }

    async fn health_check(&self) -> Result<()> {
        self.embed("health check").await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_response_shapes_decode() {
        let single: FeatureResponse = serde_json::from_str("[0.1, 0.2]").unwrap();
        assert_eq!(single.into_vectors(), vec![vec![0.1, 0.2]]);

        let batch: FeatureResponse = serde_json::from_str("[[0.1], [0.2]]").unwrap();
        assert_eq!(batch.into_vectors(), vec![vec![0.1], vec![0.2]]);
    }
}
