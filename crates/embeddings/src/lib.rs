//! # Embeddings
//!
//! The [`EmbeddingClient`] interface and adapters for the supported providers.
//! The indexer depends only on the trait; [`AnyEmbeddingClient`] picks a concrete
//! provider from an [`EmbeddingConfig`] once, when a project is opened.

mod any;
mod client;
mod error;
mod http;
mod huggingface;
mod ollama;
mod openai;
mod provider;

pub use any::AnyEmbeddingClient;
pub use client::{check_dimension, truncate_chars, EmbeddingClient};
pub use error::{EmbeddingError, Result};
pub use huggingface::HuggingFaceClient;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use provider::{EmbeddingConfig, ProviderKind};
