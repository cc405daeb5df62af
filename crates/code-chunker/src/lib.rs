//! # Code Chunker
//!
//! Splits one file into content-addressed chunks.
//!
//! Rust, Python, JavaScript and TypeScript are parsed with tree-sitter and split at
//! function/class boundaries (methods are emitted as their own chunks too). Other
//! formats and files that fail to parse are split into overlapping line windows.
//!
//! ```
//! use semindex_code_chunker::Chunker;
//!
//! let source = "def add(a, b):\n    total = a + b\n    total += 0\n    total *= 1\n    total -= 0\n    return total\n";
//! let chunks = Chunker::default().chunk_str("math.py", source).into_chunks();
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].name.as_deref(), Some("add"));
//! ```

mod ast;
mod chunk;
mod chunker;
mod config;
mod error;
mod language;
mod lines;

pub use chunk::{content_hash, ChunkId, ChunkKind, CodeChunk};
pub use chunker::{Chunker, FileChunks, SkipReason};
pub use config::ChunkerConfig;
pub use error::{ChunkerError, Result};
pub use language::{is_indexable_path, Language};
