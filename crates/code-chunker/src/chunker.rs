use crate::ast::{self, SemanticUnit};
use crate::chunk::CodeChunk;
use crate::config::ChunkerConfig;
use crate::error::Result;
use crate::language::Language;
use crate::lines;
use std::collections::HashSet;
use std::fmt;

/// Why a file produced no chunks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    UnsupportedExtension,
    TooLarge { bytes: u64 },
    Binary,
    TooSmall { non_blank_lines: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedExtension => f.write_str("unsupported extension"),
            Self::TooLarge { bytes } => write!(f, "file too large ({bytes} bytes)"),
            Self::Binary => f.write_str("binary content"),
            Self::TooSmall { non_blank_lines } => {
                write!(f, "below minimum size ({non_blank_lines} non-blank lines)")
            }
        }
    }
}

/// Result of chunking one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChunks {
    Chunks(Vec<CodeChunk>),
    Skipped(SkipReason),
}

impl FileChunks {
    #[must_use]
    pub fn into_chunks(self) -> Vec<CodeChunk> {
        match self {
            Self::Chunks(chunks) => chunks,
            Self::Skipped(_) => Vec::new(),
        }
    }
}

/// Splits file contents into [`CodeChunk`]s.
///
/// Structured languages are split at function/class boundaries; everything else
/// (and anything that fails to parse) is split into overlapping line windows.
/// Chunking never fails on malformed input.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk raw file bytes, applying the size and binary checks first
    #[must_use]
    pub fn chunk_bytes(&self, file_path: &str, bytes: &[u8]) -> FileChunks {
        self.chunk_bytes_as(file_path, bytes, Language::from_path(file_path))
    }

    /// Like [`chunk_bytes`](Self::chunk_bytes), with the language decided by the caller
    #[must_use]
    pub fn chunk_bytes_as(&self, file_path: &str, bytes: &[u8], language: Language) -> FileChunks {
        if !language.is_indexable() {
            return FileChunks::Skipped(SkipReason::UnsupportedExtension);
        }
        let len = bytes.len() as u64;
        if len > self.config.max_file_bytes {
            return FileChunks::Skipped(SkipReason::TooLarge { bytes: len });
        }
        if bytes.contains(&0) {
            return FileChunks::Skipped(SkipReason::Binary);
        }
        match std::str::from_utf8(bytes) {
            Ok(content) => self.chunk_str_as(file_path, content, language),
            Err(_) => FileChunks::Skipped(SkipReason::Binary),
        }
    }

    /// Chunk already-decoded text
    #[must_use]
    pub fn chunk_str(&self, file_path: &str, content: &str) -> FileChunks {
        self.chunk_str_as(file_path, content, Language::from_path(file_path))
    }

    #[must_use]
    pub fn chunk_str_as(&self, file_path: &str, content: &str, language: Language) -> FileChunks {
        if !language.is_indexable() {
            return FileChunks::Skipped(SkipReason::UnsupportedExtension);
        }

        let lines: Vec<&str> = content.lines().collect();
        let non_blank_lines = lines.iter().filter(|l| !l.trim().is_empty()).count();
        if non_blank_lines < self.config.min_file_lines {
            return FileChunks::Skipped(SkipReason::TooSmall { non_blank_lines });
        }
        if non_blank_lines == 0 {
            return FileChunks::Chunks(Vec::new());
        }

        let mut chunks = if language.supports_ast() {
            match ast::semantic_units(content, language, file_path) {
                Ok(units) => self.unit_chunks(&units, &lines, file_path, language),
                Err(err) => {
                    log::debug!("{file_path}: {err}; using line windows");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        if chunks.is_empty() {
            chunks = lines::window_chunks(
                &lines,
                0,
                lines.len() - 1,
                file_path,
                language,
                None,
                &self.config,
            );
        }

        let mut seen = HashSet::new();
        chunks.retain(|chunk| seen.insert(chunk.id.clone()));
        FileChunks::Chunks(chunks)
    }

    fn unit_chunks(
        &self,
        units: &[SemanticUnit],
        lines: &[&str],
        file_path: &str,
        language: Language,
    ) -> Vec<CodeChunk> {
        let last_line = lines.len() - 1;
        let mut chunks = Vec::new();
        for unit in units {
            let start = unit.start_row.min(last_line);
            let end = unit.end_row.min(last_line);
            let len = end + 1 - start;
            if len < self.config.min_chunk_lines {
                continue;
            }
            if len > self.config.max_chunk_lines {
                chunks.extend(lines::window_chunks(
                    lines,
                    start,
                    end,
                    file_path,
                    language,
                    unit.name.as_deref(),
                    &self.config,
                ));
                continue;
            }
            chunks.push(CodeChunk::new(
                file_path,
                start + 1,
                end + 1,
                lines[start..=end].join("\n"),
                language,
                unit.kind,
                unit.name.clone(),
            ));
        }
        chunks
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            config: ChunkerConfig::default(),
        }
    }
}
