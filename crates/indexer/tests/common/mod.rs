#![allow(dead_code)]

use async_trait::async_trait;
use semindex_embeddings::{EmbeddingClient, EmbeddingError, Result};
use semindex_indexer::IndexerConfig;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

/// Words the fake embedder counts; one dimension each plus a bias dimension
pub const VOCABULARY: &[&str] = &[
    "alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta", "iota", "kappa",
];

/// Deterministic keyword-count embedder with an on/off switch
pub struct FakeEmbedder {
    name: String,
    online: AtomicBool,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self::named("fake")
    }

    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            online: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Texts successfully embedded so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vectorize(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; VOCABULARY.len() + 1];
        for token in text
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_ascii_lowercase();
            if let Some(index) = VOCABULARY.iter().position(|word| *word == token) {
                vector[index] += 1.0;
            }
        }
        vector[VOCABULARY.len()] = 1.0;
        vector
    }
}

#[async_trait]
impl EmbeddingClient for FakeEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "keyword-v1"
    }

    fn dimension(&self) -> usize {
        VOCABULARY.len() + 1
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if !self.online.load(Ordering::SeqCst) {
            return Err(EmbeddingError::unavailable(
                self.name.clone(),
                "connection refused",
            ));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vectorize(text))
    }

    async fn health_check(&self) -> Result<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(EmbeddingError::unavailable(self.name.clone(), "connection refused"))
        }
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Config whose stores live under `data_dir`
pub fn config(data_dir: &TempDir) -> IndexerConfig {
    IndexerConfig {
        data_dir: data_dir.path().to_path_buf(),
        lock_timeout_seconds: 1,
        ..IndexerConfig::default()
    }
}

/// A Python function spanning `lines` lines whose tokens repeat `name`
pub fn python_function(name: &str, lines: usize) -> String {
    let mut out = format!("def {name}(items):\n    {name}_result = []\n");
    for i in 0..lines.saturating_sub(3) {
        out.push_str(&format!("    {name}_result.append(items[{i}])\n"));
    }
    out.push_str(&format!("    return {name}_result\n"));
    out
}

pub fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}
