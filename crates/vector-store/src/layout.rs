use crate::error::Result;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const PROJECT_HASH_LEN: usize = 12;

/// On-disk location of one (project, provider) store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    /// `{data_dir}/vectordb/{project_hash}_{provider}`
    pub fn for_project(data_dir: &Path, project_root: &Path, provider: &str) -> Result<Self> {
        let canonical = project_root.canonicalize()?;
        let dir = format!("{}_{}", project_hash(&canonical), sanitize(provider));
        Ok(Self {
            root: data_dir.join("vectordb").join(dir),
        })
    }

    #[must_use]
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn chunks_path(&self) -> PathBuf {
        self.root.join("chunks.json")
    }

    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("manifest.json")
    }

    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(".store.lock")
    }
}

/// First 12 hex chars of the SHA-256 of the path
#[must_use]
pub fn project_hash(path: &Path) -> String {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    let mut out = String::with_capacity(PROJECT_HASH_LEN);
    for byte in digest.iter().take(PROJECT_HASH_LEN / 2) {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn sanitize(provider: &str) -> String {
    provider
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
