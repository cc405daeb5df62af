use semindex_code_chunker::ChunkId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// What this store's vectors were produced with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDescriptor {
    pub provider: String,
    pub model: String,
    pub dimension: usize,
    /// Hash of the document template used to build embedding inputs
    #[serde(default)]
    pub template_hash: u64,
}

/// Confirmed state of one stored chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub file_path: String,
    pub content_hash: String,
    /// Generation of the last pass that observed this chunk on disk
    pub marker: u64,
}

/// Chunk identity → entry, plus a commit counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
    pub descriptor: StoreDescriptor,
    pub generation: u64,
    pub entries: BTreeMap<ChunkId, ManifestEntry>,
}

impl Manifest {
    #[must_use]
    pub const fn empty(descriptor: StoreDescriptor) -> Self {
        Self {
            schema_version: MANIFEST_SCHEMA_VERSION,
            descriptor,
            generation: 0,
            entries: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &ChunkId) -> bool {
        self.entries.contains_key(id)
    }

    /// Entries whose file satisfies `in_scope`
    pub fn entries_where<'a>(
        &'a self,
        mut in_scope: impl FnMut(&str) -> bool + 'a,
    ) -> impl Iterator<Item = (&'a ChunkId, &'a ManifestEntry)> + 'a {
        self.entries
            .iter()
            .filter(move |(_, entry)| in_scope(&entry.file_path))
    }

    /// Every file with at least one entry
    #[must_use]
    pub fn files(&self) -> BTreeSet<String> {
        self.entries.values().map(|e| e.file_path.clone()).collect()
    }
}
