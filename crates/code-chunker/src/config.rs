use crate::error::{ChunkerError, Result};
use serde::{Deserialize, Serialize};

/// Tunables for chunk extraction.
///
/// All sizes are in lines except `excerpt_chars` and `max_file_bytes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Files with fewer non-blank lines than this produce no chunks
    pub min_file_lines: usize,
    /// Semantic units and trailing windows shorter than this are dropped
    pub min_chunk_lines: usize,
    /// Size of a fallback line window
    pub window_lines: usize,
    /// Lines shared by consecutive windows
    pub window_overlap: usize,
    /// Semantic units longer than this are re-split into windows
    pub max_chunk_lines: usize,
    /// Length of the stored preview excerpt
    pub excerpt_chars: usize,
    /// Larger files are treated as non-source and skipped
    pub max_file_bytes: u64,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            min_file_lines: 6,
            min_chunk_lines: 3,
            window_lines: 50,
            window_overlap: 10,
            max_chunk_lines: 200,
            excerpt_chars: 500,
            max_file_bytes: 1024 * 1024,
        }
    }
}

impl ChunkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_lines == 0 {
            return Err(ChunkerError::InvalidConfig(
                "window_lines must be greater than zero".to_string(),
            ));
        }
        if self.window_overlap >= self.window_lines {
            return Err(ChunkerError::InvalidConfig(format!(
                "window_overlap ({}) must be smaller than window_lines ({})",
                self.window_overlap, self.window_lines
            )));
        }
        if self.max_chunk_lines < self.window_lines {
            return Err(ChunkerError::InvalidConfig(format!(
                "max_chunk_lines ({}) must be at least window_lines ({})",
                self.max_chunk_lines, self.window_lines
            )));
        }
        Ok(())
    }

    pub(crate) const fn window_step(&self) -> usize {
        self.window_lines - self.window_overlap
    }
}
