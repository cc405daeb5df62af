use crate::error::{EmbeddingError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Supported embedding backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// nomic-embed-text on a local Ollama service
    #[default]
    Ollama,
    /// mxbai-embed-large on a local Ollama service
    Mxbai,
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "huggingface")]
    HuggingFace,
}

impl ProviderKind {
    pub const ALL: [Self; 4] = [Self::Ollama, Self::Mxbai, Self::OpenAi, Self::HuggingFace];

    /// Stable name, also used in store directory names
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Mxbai => "mxbai",
            Self::OpenAi => "openai",
            Self::HuggingFace => "huggingface",
        }
    }

    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Ollama => "nomic-embed-text",
            Self::Mxbai => "mxbai-embed-large",
            Self::OpenAi => "text-embedding-3-small",
            Self::HuggingFace => "sentence-transformers/all-mpnet-base-v2",
        }
    }

    #[must_use]
    pub const fn default_dimension(self) -> usize {
        match self {
            Self::Ollama | Self::HuggingFace => 768,
            Self::Mxbai => 1024,
            Self::OpenAi => 1536,
        }
    }

    #[must_use]
    pub const fn default_base_url(self) -> &'static str {
        match self {
            Self::Ollama | Self::Mxbai => "http://localhost:11434",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::HuggingFace => "https://api-inference.huggingface.co",
        }
    }

    /// Inputs longer than this (in chars) are truncated before sending
    #[must_use]
    pub const fn max_input_chars(self) -> usize {
        match self {
            Self::Ollama => 4000,
            Self::Mxbai | Self::HuggingFace => 2000,
            Self::OpenAi => 8000,
        }
    }

    #[must_use]
    pub const fn default_api_key_env(self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::HuggingFace => Some("HF_TOKEN"),
            Self::Ollama | Self::Mxbai => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = EmbeddingError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                EmbeddingError::InvalidConfig(format!(
                    "unknown provider '{s}' (expected ollama, mxbai, openai or huggingface)"
                ))
            })
    }
}

/// Provider selection plus optional overrides of its defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub kind: ProviderKind,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub dimension: Option<usize>,
    /// Environment variable holding the API key (remote providers only)
    pub api_key_env: Option<String>,
    pub timeout_secs: u64,
    /// Upper bound on in-flight requests during a batch
    pub max_concurrency: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::for_kind(ProviderKind::default())
    }
}

impl EmbeddingConfig {
    #[must_use]
    pub const fn for_kind(kind: ProviderKind) -> Self {
        Self {
            kind,
            base_url: None,
            model: None,
            dimension: None,
            api_key_env: None,
            timeout_secs: 60,
            max_concurrency: 10,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> String {
        let url = self
            .base_url
            .as_deref()
            .unwrap_or_else(|| self.kind.default_base_url());
        url.trim_end_matches('/').to_string()
    }

    #[must_use]
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.kind.default_model())
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
            .unwrap_or_else(|| self.kind.default_dimension())
    }

    #[must_use]
    pub fn api_key_env(&self) -> Option<&str> {
        self.api_key_env
            .as_deref()
            .or_else(|| self.kind.default_api_key_env())
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        let Some(env) = self.api_key_env() else {
            return Ok(String::new());
        };
        match std::env::var(env) {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => Err(EmbeddingError::MissingApiKey {
                provider: self.kind.as_str().to_string(),
                env: env.to_string(),
            }),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimension() == 0 {
            return Err(EmbeddingError::InvalidConfig(
                "dimension must be greater than zero".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(EmbeddingError::InvalidConfig(
                "max_concurrency must be greater than zero".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(EmbeddingError::InvalidConfig(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_provider_names() {
        assert_eq!("ollama".parse::<ProviderKind>().unwrap(), ProviderKind::Ollama);
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!(
            " huggingface ".parse::<ProviderKind>().unwrap(),
            ProviderKind::HuggingFace
        );
        assert!("gemini".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn serde_names_match_display() {
        for kind in ProviderKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }

    #[test]
    fn overrides_take_precedence() {
        let config = EmbeddingConfig {
            base_url: Some("http://gpu-box:11434/".to_string()),
            dimension: Some(384),
            ..EmbeddingConfig::for_kind(ProviderKind::Mxbai)
        };
        assert_eq!(config.base_url(), "http://gpu-box:11434");
        assert_eq!(config.model(), "mxbai-embed-large");
        assert_eq!(config.dimension(), 384);
        assert_eq!(config.api_key_env(), None);
    }

    #[test]
    fn missing_api_key_is_reported() {
        let config = EmbeddingConfig {
            api_key_env: Some("SEMINDEX_TEST_UNSET_KEY_VAR".to_string()),
            ..EmbeddingConfig::for_kind(ProviderKind::OpenAi)
        };
        assert!(matches!(
            config.api_key(),
            Err(EmbeddingError::MissingApiKey { .. })
        ));
    }
}
