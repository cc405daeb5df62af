use semindex_code_chunker::{ChunkId, ChunkKind, CodeChunk, Language};
use serde::{Deserialize, Serialize};

/// A stored chunk: metadata, preview and embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: ChunkId,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content_hash: String,
    pub language: Language,
    pub kind: ChunkKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub excerpt: String,
    pub embedding: Vec<f32>,
}

impl ChunkRecord {
    #[must_use]
    pub fn from_chunk(chunk: &CodeChunk, embedding: Vec<f32>, excerpt_chars: usize) -> Self {
        Self {
            id: chunk.id.clone(),
            file_path: chunk.file_path.clone(),
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            content_hash: chunk.content_hash.clone(),
            language: chunk.language,
            kind: chunk.kind,
            name: chunk.name.clone(),
            excerpt: chunk.excerpt(excerpt_chars),
            embedding,
        }
    }
}

/// One ranked query result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: ChunkId,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    /// Cosine similarity in `[-1, 1]`
    pub score: f32,
    pub excerpt: String,
    pub kind: ChunkKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl SearchHit {
    pub(crate) fn from_record(record: &ChunkRecord, score: f32) -> Self {
        Self {
            id: record.id.clone(),
            file_path: record.file_path.clone(),
            start_line: record.start_line,
            end_line: record.end_line,
            score,
            excerpt: record.excerpt.clone(),
            kind: record.kind,
            name: record.name.clone(),
        }
    }
}
