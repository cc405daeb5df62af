use crate::client::{check_dimension, truncate_chars, EmbeddingClient};
use crate::error::{EmbeddingError, Result};
use crate::http;
use crate::provider::{EmbeddingConfig, ProviderKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

const PROVIDER: &str = "openai";
/// Inputs per request; the API accepts up to 2048
const MAX_INPUTS_PER_REQUEST: usize = 256;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI (or API-compatible) `/embeddings` endpoint
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
    /// Sent only when it differs from the model's native size
    requested_dimension: Option<usize>,
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        config.validate()?;
        let api_key = config.api_key()?;
        let dimension = config.dimension();
        Ok(Self {
            client: http::build_client(config.timeout())?,
            api_key,
            base_url: config.base_url(),
            model: config.model().to_string(),
            dimension,
            requested_dimension: (dimension != ProviderKind::OpenAi.default_dimension())
                .then_some(dimension),
        })
    }

    async fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts
                .iter()
                .map(|t| truncate_chars(t, ProviderKind::OpenAi.max_input_chars()))
                .collect(),
            dimensions: self.requested_dimension,
        };
        let request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body);
        let response: EmbeddingResponse = http::send_json(PROVIDER, request).await?;
        order_by_index(response.data, texts.len())
    }
}

/// Put response vectors back in input order
fn order_by_index(data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(EmbeddingError::invalid_response(
            PROVIDER,
            format!("expected {expected} embeddings, got {}", data.len()),
        ));
    }
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in data {
        let slot = slots.get_mut(item.index).ok_or_else(|| {
            EmbeddingError::invalid_response(PROVIDER, format!("index {} out of range", item.index))
        })?;
        *slot = Some(item.embedding);
    }
    slots
        .into_iter()
        .map(|slot| {
            slot.ok_or_else(|| EmbeddingError::invalid_response(PROVIDER, "missing embedding index"))
        })
        .collect()
}

#[async_trait]
impl EmbeddingClient for OpenAiClient {
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
        let mut results = Vec::with_capacity(texts.len());
        for group in texts.chunks(MAX_INPUTS_PER_REQUEST) {
            let refs: Vec<&str> = group.iter().map(String::as_str).collect();
            match self.request(&refs).await {
                Ok(vectors) => results.extend(
                    vectors
                        .into_iter()
                        .map(|v| check_dimension(self.dimension, v)),
                ),
                Err(err) => results.extend(std::iter::repeat(Err(err)).take(group.len())),
            }
        }
        results
    }

    async fn health_check(&self) -> Result<()> {
        let request = self
            .client
            .get(format!("{}/models/{}", self.base_url, self.model))
            .bearer_auth(&self.api_key);
        let _: serde_json::Value = http::send_json(PROVIDER, request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(index: usize, value: f32) -> EmbeddingData {
        EmbeddingData {
            index,
            embedding: vec![value],
        }
    }

    #[test]
    fn vectors_are_reordered_by_index() {
        let ordered = order_by_index(vec![item(1, 1.0), item(0, 0.0), item(2, 2.0)], 3).unwrap();
        assert_eq!(ordered, vec![vec![0.0], vec![1.0], vec![2.0]]);
    }

    #[test]
    fn short_or_gappy_responses_are_invalid() {
        assert!(order_by_index(vec![item(0, 0.0)], 2).is_err());
        assert!(order_by_index(vec![item(0, 0.0), item(0, 1.0)], 2).is_err());
        assert!(order_by_index(vec![item(0, 0.0), item(5, 1.0)], 2).is_err());
    }
}
