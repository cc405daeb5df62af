//! Indexer settings: TOML file plus `SEMINDEX_*` environment overrides.

use crate::error::{IndexerError, Result};
use semindex_code_chunker::ChunkerConfig;
use semindex_embeddings::{EmbeddingConfig, ProviderKind};
use semindex_vector_store::DocumentTemplate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_DATA_DIR: &str = "SEMINDEX_DATA_DIR";
pub const ENV_PROVIDER: &str = "SEMINDEX_PROVIDER";
pub const ENV_DEBOUNCE_SECS: &str = "SEMINDEX_DEBOUNCE_SECS";
pub const ENV_LOCK_TIMEOUT_SECS: &str = "SEMINDEX_LOCK_TIMEOUT_SECS";

/// Extra path filtering on top of the built-in ignore list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Extensions (without the dot) indexed as plain text
    pub include_extensions: Vec<String>,
    /// Directory names skipped anywhere in the tree
    pub exclude_dirs: Vec<String>,
    /// Globs matched against project-relative paths
    pub exclude_globs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Root of all stores (`{data_dir}/vectordb/...`)
    pub data_dir: PathBuf,
    pub provider: EmbeddingConfig,
    /// Idle window before a watcher reindexes
    pub debounce_seconds: f64,
    /// Bound on waiting for the store's writer lock
    pub lock_timeout_seconds: u64,
    /// Chunks per embedding request batch
    pub embed_batch_size: usize,
    pub chunker: ChunkerConfig,
    pub filter: FilterConfig,
    pub template: DocumentTemplate,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            provider: EmbeddingConfig::default(),
            debounce_seconds: 2.0,
            lock_timeout_seconds: 30,
            embed_batch_size: 50,
            chunker: ChunkerConfig::default(),
            filter: FilterConfig::default(),
            template: DocumentTemplate::default(),
        }
    }
}

/// `~/.semindex`, or `./.semindex` when there is no home directory
#[must_use]
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir().map_or_else(|| PathBuf::from(".semindex"), |home| home.join(".semindex"))
}

impl IndexerConfig {
    /// Parse TOML; missing keys keep their defaults
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|err| IndexerError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read `path`, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            IndexerError::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        let mut config: Self = toml::from_str(&raw)
            .map_err(|err| IndexerError::Config(format!("{}: {err}", path.display())))?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with the environment
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = var(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = var(ENV_PROVIDER) {
            let kind: ProviderKind = raw
                .parse()
                .map_err(|err| IndexerError::Config(format!("{ENV_PROVIDER}: {err}")))?;
            if kind != self.provider.kind {
                // Model and endpoint overrides belong to the previous provider
                self.provider = EmbeddingConfig {
                    timeout_secs: self.provider.timeout_secs,
                    max_concurrency: self.provider.max_concurrency,
                    ..EmbeddingConfig::for_kind(kind)
                };
            }
        }
        if let Some(raw) = var(ENV_DEBOUNCE_SECS) {
            self.debounce_seconds = raw.trim().parse().map_err(|_| {
                IndexerError::Config(format!("{ENV_DEBOUNCE_SECS}: not a number: {raw}"))
            })?;
        }
        if let Some(raw) = var(ENV_LOCK_TIMEOUT_SECS) {
            self.lock_timeout_seconds = raw.trim().parse().map_err(|_| {
                IndexerError::Config(format!("{ENV_LOCK_TIMEOUT_SECS}: not an integer: {raw}"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        debounce_duration(self.debounce_seconds)?;
        if self.lock_timeout_seconds == 0 {
            return Err(IndexerError::Config(
                "lock_timeout_seconds must be greater than zero".to_string(),
            ));
        }
        if self.embed_batch_size == 0 {
            return Err(IndexerError::Config(
                "embed_batch_size must be greater than zero".to_string(),
            ));
        }
        self.provider
            .validate()
            .map_err(|err| IndexerError::Config(err.to_string()))?;
        self.chunker.validate()?;
        self.template
            .validate()
            .map_err(|err| IndexerError::Config(err.to_string()))?;
        Ok(())
    }

    pub fn debounce(&self) -> Result<Duration> {
        debounce_duration(self.debounce_seconds)
    }

    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_seconds)
    }
}

/// Validate a debounce window given in (fractional) seconds
pub fn debounce_duration(seconds: f64) -> Result<Duration> {
    if !seconds.is_finite() || seconds <= 0.0 || seconds > 3600.0 {
        return Err(IndexerError::Config(format!(
            "debounce must be in (0, 3600] seconds (got {seconds})"
        )));
    }
    Ok(Duration::from_secs_f64(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn empty_toml_is_all_defaults() {
        let config = IndexerConfig::from_toml_str("").unwrap();
        assert_eq!(config, IndexerConfig::default());
        assert_eq!(config.debounce().unwrap(), Duration::from_secs(2));
        assert_eq!(config.embed_batch_size, 50);
        assert!(config.data_dir.ends_with(".semindex"));
    }

    #[test]
    fn toml_sections_override_defaults() {
        let raw = r#"
            data_dir = "/var/lib/semindex"
            debounce_seconds = 0.5

            [provider]
            kind = "openai"
            model = "text-embedding-3-large"
            dimension = 3072

            [chunker]
            window_lines = 40

            [filter]
            exclude_dirs = ["generated"]
            exclude_globs = ["**/*.min.js"]
        "#;
        let config = IndexerConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/semindex"));
        assert_eq!(config.debounce().unwrap(), Duration::from_millis(500));
        assert_eq!(config.provider.kind, ProviderKind::OpenAi);
        assert_eq!(config.provider.dimension(), 3072);
        assert_eq!(config.chunker.window_lines, 40);
        assert_eq!(config.chunker.window_overlap, 10);
        assert_eq!(config.filter.exclude_dirs, vec!["generated".to_string()]);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(IndexerConfig::from_toml_str("debounce_seconds = 0.0").is_err());
        assert!(IndexerConfig::from_toml_str("embed_batch_size = 0").is_err());
        assert!(IndexerConfig::from_toml_str("[chunker]\nwindow_overlap = 80").is_err());
        assert!(IndexerConfig::from_toml_str("data_dir = [").is_err());
    }

    #[test]
    fn environment_overrides_win() {
        let vars: HashMap<&str, &str> = [
            (ENV_DATA_DIR, "/tmp/semindex-data"),
            (ENV_PROVIDER, "huggingface"),
            (ENV_DEBOUNCE_SECS, "1.5"),
            (ENV_LOCK_TIMEOUT_SECS, "5"),
        ]
        .into_iter()
        .collect();
        let mut config = IndexerConfig::default();
        config.provider.model = Some("custom-ollama-model".to_string());
        config
            .apply_env_from(|key| vars.get(key).map(ToString::to_string))
            .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/semindex-data"));
        assert_eq!(config.provider.kind, ProviderKind::HuggingFace);
        assert_eq!(config.provider.model, None);
        assert_eq!(config.debounce().unwrap(), Duration::from_millis(1500));
        assert_eq!(config.lock_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn malformed_environment_is_an_error() {
        let mut config = IndexerConfig::default();
        let err = config
            .apply_env_from(|key| (key == ENV_DEBOUNCE_SECS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_DEBOUNCE_SECS));

        let err = config
            .apply_env_from(|key| (key == ENV_PROVIDER).then(|| "word2vec".to_string()))
            .unwrap_err();
        assert!(matches!(err, IndexerError::Config(_)));
    }
}
