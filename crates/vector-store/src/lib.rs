//! # Vector Store
//!
//! Durable chunk embeddings for one (project, provider) pair.
//!
//! ```text
//! {data_dir}/vectordb/{project_hash}_{provider}/
//!     chunks.json     records with embeddings
//!     manifest.json   chunk id -> confirmed entry, generation counter
//!     .store.lock     cross-process writer lock
//! ```
//!
//! Records are written before the manifest, both atomically, so the manifest never
//! points at a record that is not on disk. Opening the store cross-checks the two
//! and reports files that need a rescan through
//! [`VectorStore::take_affected_files`].

mod error;
mod filter;
mod layout;
mod lock;
mod manifest;
mod record;
mod similarity;
mod store;
mod templates;

pub use error::{Result, VectorStoreError};
pub use filter::QueryFilter;
pub use layout::{project_hash, StoreLayout};
pub use lock::FileLockGuard;
pub use manifest::{Manifest, ManifestEntry, StoreDescriptor, MANIFEST_SCHEMA_VERSION};
pub use record::{ChunkRecord, SearchHit};
pub use similarity::cosine_similarity;
pub use store::{StoreStats, StoreWriter, VectorStore};
pub use templates::DocumentTemplate;
