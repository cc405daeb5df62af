//! # Indexer
//!
//! Incremental indexing of a project directory for semantic code search.
//!
//! ## Pipeline
//!
//! ```text
//! Watcher (debounced fs events) ──┐
//!                                 ├──> Coordinator (one pass at a time)
//! Host reindex(scope, force) ─────┘        │
//!                                          ├──> Scanner + Chunker
//!                                          │      └─> chunks per file
//!                                          ├──> Diff against manifest
//!                                          │      └─> embed / keep / sweep
//!                                          └──> Vector Store (commit)
//! ```
//!
//! A chunk is only recorded in the manifest once its embedding is stored, so a
//! failed or interrupted pass is repaired by the next one.
//!
//! ## Example
//!
//! ```no_run
//! use semindex_indexer::{IndexerConfig, ReindexScope, SemanticIndex};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let index = SemanticIndex::new(IndexerConfig::from_env()?)?;
//!     let project = Path::new("/path/to/project");
//!
//!     let report = index.reindex(project, ReindexScope::All, false).await?;
//!     println!("{} chunks embedded", report.indexed_chunks);
//!
//!     for hit in index.query(project, "parse config file", 5).await? {
//!         println!("{}:{} {:.3}", hit.file_path, hit.start_line, hit.score);
//!     }
//!     Ok(())
//! }
//! ```

mod config;
mod coordinator;
mod diff;
mod error;
mod extract;
mod filter;
mod project;
mod registry;
mod scanner;
mod service;
mod watcher;

pub use config::{
    debounce_duration, default_data_dir, FilterConfig, IndexerConfig, ENV_DATA_DIR,
    ENV_DEBOUNCE_SECS, ENV_LOCK_TIMEOUT_SECS, ENV_PROVIDER,
};
pub use coordinator::{IndexCoordinator, ReindexReport, ReindexScope, ReindexStatus};
pub use error::{IndexerError, Result};
pub use filter::{PathFilter, IGNORED_DIRS};
pub use project::{canonical_root, ProjectIndex};
pub use registry::WatcherRegistry;
pub use scanner::{normalize_path, relativize, FileScanner};
pub use service::SemanticIndex;
pub use watcher::{ProjectWatcher, WatcherHandle, WatcherState, WatcherStatus};

pub use semindex_vector_store::{QueryFilter, SearchHit, StoreStats};
