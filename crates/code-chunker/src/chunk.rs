use crate::language::Language;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fmt::Write as _;

/// Stable identity of a chunk.
///
/// Derived from `(file_path, start_line, end_line, content_hash)`; the same text at
/// the same place always maps to the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(String);

impl ChunkId {
    const HASH_PREFIX_LEN: usize = 16;

    #[must_use]
    pub fn new(file_path: &str, start_line: usize, end_line: usize, content_hash: &str) -> Self {
        let prefix_len = content_hash.len().min(Self::HASH_PREFIX_LEN);
        Self(format!(
            "{file_path}:{start_line}-{end_line}:{}",
            &content_hash[..prefix_len]
        ))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ChunkId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// SHA-256 hex digest of the exact chunk text
#[must_use]
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// What produced a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Function,
    Method,
    Class,
    Impl,
    Trait,
    Struct,
    Enum,
    Interface,
    TypeAlias,
    Module,
    /// Fixed-size line window (fallback strategy)
    Window,
}

impl ChunkKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Impl => "impl",
            Self::Trait => "trait",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Interface => "interface",
            Self::TypeAlias => "type_alias",
            Self::Module => "module",
            Self::Window => "window",
        }
    }
}

/// One indexable unit of a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChunk {
    pub id: ChunkId,
    /// Project-relative path with `/` separators
    pub file_path: String,
    /// 1-based, inclusive
    pub start_line: usize,
    /// 1-based, inclusive
    pub end_line: usize,
    pub content: String,
    pub content_hash: String,
    pub language: Language,
    pub kind: ChunkKind,
    pub name: Option<String>,
}

impl CodeChunk {
    #[must_use]
    pub fn new(
        file_path: impl Into<String>,
        start_line: usize,
        end_line: usize,
        content: String,
        language: Language,
        kind: ChunkKind,
        name: Option<String>,
    ) -> Self {
        let file_path = file_path.into();
        let content_hash = content_hash(&content);
        let id = ChunkId::new(&file_path, start_line, end_line, &content_hash);
        Self {
            id,
            file_path,
            start_line,
            end_line,
            content,
            content_hash,
            language,
            kind,
            name,
        }
    }

    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.end_line + 1 - self.start_line
    }

    /// Leading slice of the content, cut on a char boundary
    #[must_use]
    pub fn excerpt(&self, max_chars: usize) -> String {
        match self.content.char_indices().nth(max_chars) {
            Some((idx, _)) => format!("{}...", &self.content[..idx]),
            None => self.content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_deterministic() {
        let a = CodeChunk::new(
            "src/a.py",
            1,
            3,
            "def a():\n    pass\n".to_string(),
            Language::Python,
            ChunkKind::Function,
            Some("a".to_string()),
        );
        let b = CodeChunk::new(
            "src/a.py",
            1,
            3,
            "def a():\n    pass\n".to_string(),
            Language::Python,
            ChunkKind::Function,
            None,
        );
        assert_eq!(a.id, b.id);
        assert!(a.id.as_str().starts_with("src/a.py:1-3:"));
    }

    #[test]
    fn id_changes_with_location_or_content() {
        let hash = content_hash("x");
        assert_ne!(ChunkId::new("a.rs", 1, 2, &hash), ChunkId::new("a.rs", 2, 3, &hash));
        assert_ne!(
            ChunkId::new("a.rs", 1, 2, &hash),
            ChunkId::new("a.rs", 1, 2, &content_hash("y"))
        );
    }

    #[test]
    fn content_hash_is_hex_sha256() {
        let hash = content_hash("");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        let chunk = CodeChunk::new(
            "notes.md",
            1,
            1,
            "héllo wörld".to_string(),
            Language::Markdown,
            ChunkKind::Window,
            None,
        );
        assert_eq!(chunk.excerpt(5), "héllo...");
        assert_eq!(chunk.excerpt(100), "héllo wörld");
    }
}
