use crate::error::{Result, VectorStoreError};
use crate::filter::QueryFilter;
use crate::layout::StoreLayout;
use crate::lock::FileLockGuard;
use crate::manifest::{Manifest, ManifestEntry, StoreDescriptor, MANIFEST_SCHEMA_VERSION};
use crate::record::{ChunkRecord, SearchHit};
use crate::similarity;
use semindex_code_chunker::ChunkId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::PoisonError;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, MutexGuard, RwLock};

const CHUNKS_SCHEMA_VERSION: u32 = 1;

#[derive(Deserialize)]
struct ChunksFile {
    records: Vec<ChunkRecord>,
}

#[derive(Serialize)]
struct ChunksFileRef<'a> {
    schema_version: u32,
    records: Vec<&'a ChunkRecord>,
}

/// Store summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_chunks: usize,
    pub files_indexed: usize,
    pub provider: String,
    pub model: String,
    pub dimension: usize,
    pub generation: u64,
    pub store_path: PathBuf,
    pub size_bytes: u64,
}

#[derive(Debug, Clone)]
struct StoreState {
    records: BTreeMap<ChunkId, ChunkRecord>,
    manifest: Manifest,
}

impl StoreState {
    const fn empty(descriptor: StoreDescriptor) -> Self {
        Self {
            records: BTreeMap::new(),
            manifest: Manifest::empty(descriptor),
        }
    }
}

enum ManifestLoad {
    Missing,
    Corrupt(String),
    Parsed(Manifest),
}

/// Durable embedding store for one (project, provider) pair.
///
/// Readers see the last committed state. Mutation goes through a [`StoreWriter`],
/// which holds both an in-process mutex and the cross-process file lock.
#[derive(Debug)]
pub struct VectorStore {
    layout: StoreLayout,
    descriptor: StoreDescriptor,
    lock_timeout: Duration,
    state: RwLock<StoreState>,
    writer: Mutex<()>,
    affected: std::sync::Mutex<BTreeSet<String>>,
}

impl VectorStore {
    pub async fn open(
        layout: StoreLayout,
        descriptor: StoreDescriptor,
        lock_timeout: Duration,
    ) -> Result<Self> {
        tokio::fs::create_dir_all(layout.root()).await?;
        let (state, affected) = load_state(&layout, &descriptor).await?;
        log::debug!(
            "opened store {} ({} chunks, generation {})",
            layout.root().display(),
            state.records.len(),
            state.manifest.generation
        );
        Ok(Self {
            layout,
            descriptor,
            lock_timeout,
            state: RwLock::new(state),
            writer: Mutex::new(()),
            affected: std::sync::Mutex::new(affected),
        })
    }

    #[must_use]
    pub const fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    #[must_use]
    pub const fn descriptor(&self) -> &StoreDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.descriptor.dimension
    }

    pub async fn count(&self) -> usize {
        self.state.read().await.records.len()
    }

    /// Snapshot of the committed manifest
    pub async fn manifest(&self) -> Manifest {
        self.state.read().await.manifest.clone()
    }

    pub async fn ids_for_file(&self, file_path: &str) -> Vec<ChunkId> {
        self.state
            .read()
            .await
            .manifest
            .entries_where(|f| f == file_path)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Files whose stored state failed the integrity check and need a full rescan.
    ///
    /// Drains the set.
    pub fn take_affected_files(&self) -> BTreeSet<String> {
        let mut affected = self
            .affected
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *affected)
    }

    fn add_affected(&self, files: BTreeSet<String>) {
        if files.is_empty() {
            return;
        }
        self.affected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(files);
    }

    /// Nearest chunks to `embedding` by cosine similarity
    pub async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        self.query_filtered(embedding, top_k, &QueryFilter::default())
            .await
    }

    /// Like [`query`](Self::query), ranking only records that pass `filter`
    pub async fn query_filtered(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: &QueryFilter,
    ) -> Result<Vec<SearchHit>> {
        if embedding.len() != self.descriptor.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.descriptor.dimension,
                actual: embedding.len(),
            });
        }
        let state = self.state.read().await;
        let candidates = state.records.values().filter(|record| filter.matches(record));
        Ok(similarity::rank(candidates, embedding, top_k))
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let (total_chunks, files_indexed, generation) = {
            let state = self.state.read().await;
            let files: BTreeSet<&str> = state
                .records
                .values()
                .map(|r| r.file_path.as_str())
                .collect();
            (
                state.records.len(),
                files.len(),
                state.manifest.generation,
            )
        };
        let mut size_bytes = 0;
        for path in [self.layout.chunks_path(), self.layout.manifest_path()] {
            match tokio::fs::metadata(&path).await {
                Ok(meta) => size_bytes += meta.len(),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(StoreStats {
            total_chunks,
            files_indexed,
            provider: self.descriptor.provider.clone(),
            model: self.descriptor.model.clone(),
            dimension: self.descriptor.dimension,
            generation,
            store_path: self.layout.root().to_path_buf(),
            size_bytes,
        })
    }

    /// Take exclusive write access.
    ///
    /// Waits for other writers in this process, then polls the file lock for at
    /// most the configured timeout. Fails with [`VectorStoreError::LockTimeout`]
    /// without touching any state.
    pub async fn writer(&self) -> Result<StoreWriter<'_>> {
        let in_process = match tokio::time::timeout(self.lock_timeout, self.writer.lock()).await {
            Ok(guard) => guard,
            Err(_) => {
                #[allow(clippy::cast_possible_truncation)]
                return Err(VectorStoreError::LockTimeout {
                    path: self.layout.lock_path(),
                    waited_ms: self.lock_timeout.as_millis() as u64,
                });
            }
        };
        let file_lock = FileLockGuard::acquire(&self.layout.lock_path(), self.lock_timeout).await?;

        // Another process may have committed since we last loaded.
        let (state, affected) = load_state(&self.layout, &self.descriptor).await?;
        self.add_affected(affected);
        *self.state.write().await = state.clone();

        let generation = state.manifest.generation + 1;
        Ok(StoreWriter {
            store: self,
            _in_process: in_process,
            _file_lock: file_lock,
            state,
            generation,
            records_dirty: false,
            manifest_dirty: false,
        })
    }

    /// Insert or replace records in one locked commit
    pub async fn upsert(&self, records: Vec<ChunkRecord>) -> Result<usize> {
        let mut writer = self.writer().await?;
        let count = writer.upsert(records)?;
        writer.commit().await?;
        Ok(count)
    }

    /// Remove records in one locked commit; returns how many existed
    pub async fn delete(&self, ids: &[ChunkId]) -> Result<usize> {
        let mut writer = self.writer().await?;
        let count = writer.delete(ids);
        writer.commit().await?;
        Ok(count)
    }
}

/// Exclusive, staged access to a [`VectorStore`].
///
/// Changes become durable and visible to readers on [`flush`](Self::flush) or
/// [`commit`](Self::commit); dropping the writer discards unflushed changes and
/// releases the lock.
pub struct StoreWriter<'a> {
    store: &'a VectorStore,
    _in_process: MutexGuard<'a, ()>,
    _file_lock: FileLockGuard,
    state: StoreState,
    generation: u64,
    records_dirty: bool,
    manifest_dirty: bool,
}

impl StoreWriter<'_> {
    /// Marker stamped on every entry touched by this writer
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub const fn manifest(&self) -> &Manifest {
        &self.state.manifest
    }

    pub fn upsert(&mut self, records: Vec<ChunkRecord>) -> Result<usize> {
        let dimension = self.store.descriptor.dimension;
        if let Some(bad) = records.iter().find(|r| r.embedding.len() != dimension) {
            return Err(VectorStoreError::DimensionMismatch {
                expected: dimension,
                actual: bad.embedding.len(),
            });
        }
        let count = records.len();
        for record in records {
            self.state.manifest.entries.insert(
                record.id.clone(),
                ManifestEntry {
                    file_path: record.file_path.clone(),
                    content_hash: record.content_hash.clone(),
                    marker: self.generation,
                },
            );
            self.state.records.insert(record.id.clone(), record);
        }
        self.records_dirty |= count > 0;
        Ok(count)
    }

    /// Confirm that already-stored chunks were observed by this pass
    pub fn mark_present<'i>(&mut self, ids: impl IntoIterator<Item = &'i ChunkId>) {
        for id in ids {
            if let Some(entry) = self.state.manifest.entries.get_mut(id) {
                if entry.marker != self.generation {
                    entry.marker = self.generation;
                    self.manifest_dirty = true;
                }
            }
        }
    }

    pub fn delete(&mut self, ids: &[ChunkId]) -> usize {
        let mut removed = 0;
        for id in ids {
            let had_entry = self.state.manifest.entries.remove(id).is_some();
            let had_record = self.state.records.remove(id).is_some();
            if had_entry || had_record {
                removed += 1;
            }
        }
        self.records_dirty |= removed > 0;
        removed
    }

    /// Persist staged changes: records first, then the manifest.
    ///
    /// Marker-only changes rewrite just the manifest.
    pub async fn flush(&mut self) -> Result<()> {
        if !self.records_dirty && !self.manifest_dirty {
            return Ok(());
        }
        self.state.manifest.generation = self.generation;
        self.state.manifest.schema_version = MANIFEST_SCHEMA_VERSION;

        if self.records_dirty {
            let chunks = ChunksFileRef {
                schema_version: CHUNKS_SCHEMA_VERSION,
                records: self.state.records.values().collect(),
            };
            write_json_atomic(&self.store.layout.chunks_path(), &chunks).await?;
        }
        write_json_atomic(&self.store.layout.manifest_path(), &self.state.manifest).await?;

        *self.store.state.write().await = self.state.clone();
        self.records_dirty = false;
        self.manifest_dirty = false;
        Ok(())
    }

    /// Flush and release; returns the committed generation
    pub async fn commit(mut self) -> Result<u64> {
        self.flush().await?;
        Ok(self.state.manifest.generation)
    }
}

async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    let tmp = path.with_extension("json.tmp");
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(&bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

async fn load_state(
    layout: &StoreLayout,
    descriptor: &StoreDescriptor,
) -> Result<(StoreState, BTreeSet<String>)> {
    let records = match read_optional(&layout.chunks_path()).await? {
        None => Vec::new(),
        Some(bytes) => match serde_json::from_slice::<ChunksFile>(&bytes) {
            Ok(file) => file.records,
            Err(err) => {
                log::warn!(
                    "{} unreadable, discarding records: {err}",
                    layout.chunks_path().display()
                );
                Vec::new()
            }
        },
    };
    let manifest = match read_optional(&layout.manifest_path()).await? {
        None => ManifestLoad::Missing,
        Some(bytes) => match serde_json::from_slice::<Manifest>(&bytes) {
            Ok(manifest) => ManifestLoad::Parsed(manifest),
            Err(err) => ManifestLoad::Corrupt(err.to_string()),
        },
    };
    Ok(reconcile(layout, records, manifest, descriptor))
}

/// Integrity check between records and manifest.
///
/// Returns the usable state plus the files whose stored chunks cannot be trusted.
fn reconcile(
    layout: &StoreLayout,
    records: Vec<ChunkRecord>,
    manifest: ManifestLoad,
    descriptor: &StoreDescriptor,
) -> (StoreState, BTreeSet<String>) {
    let mut records: BTreeMap<ChunkId, ChunkRecord> =
        records.into_iter().map(|r| (r.id.clone(), r)).collect();
    let mut affected = BTreeSet::new();

    let manifest = match manifest {
        ManifestLoad::Missing if records.is_empty() => {
            return (StoreState::empty(descriptor.clone()), affected);
        }
        ManifestLoad::Missing => Err("manifest missing while records exist".to_string()),
        ManifestLoad::Corrupt(reason) => Err(reason),
        ManifestLoad::Parsed(manifest) => Ok(manifest),
    };

    let mut manifest = match manifest {
        Ok(manifest) => manifest,
        Err(reason) => {
            let err = VectorStoreError::ManifestCorrupt {
                path: layout.manifest_path(),
                reason,
            };
            log::warn!("{err}; scheduling affected files for rescan");
            affected.extend(records.values().map(|r| r.file_path.clone()));
            let mut rebuilt = Manifest::empty(descriptor.clone());
            rebuilt.entries = records
                .values()
                .map(|r| {
                    (
                        r.id.clone(),
                        ManifestEntry {
                            file_path: r.file_path.clone(),
                            content_hash: r.content_hash.clone(),
                            marker: 0,
                        },
                    )
                })
                .collect();
            return (
                StoreState {
                    records,
                    manifest: rebuilt,
                },
                affected,
            );
        }
    };

    if manifest.descriptor != *descriptor {
        log::info!(
            "store {} was built with {}/{} (dim {}), discarding for {}/{} (dim {})",
            layout.root().display(),
            manifest.descriptor.provider,
            manifest.descriptor.model,
            manifest.descriptor.dimension,
            descriptor.provider,
            descriptor.model,
            descriptor.dimension
        );
        affected.extend(manifest.files());
        affected.extend(records.values().map(|r| r.file_path.clone()));
        let mut state = StoreState::empty(descriptor.clone());
        state.manifest.generation = manifest.generation;
        return (state, affected);
    }

    manifest.entries.retain(|id, entry| {
        let intact = records.get(id).is_some_and(|r| {
            r.content_hash == entry.content_hash && r.embedding.len() == descriptor.dimension
        });
        if !intact {
            affected.insert(entry.file_path.clone());
            records.remove(id);
        }
        intact
    });
    records.retain(|id, record| {
        let known = manifest.entries.contains_key(id);
        if !known {
            affected.insert(record.file_path.clone());
        }
        known
    });

    if !affected.is_empty() {
        log::warn!(
            "store {}: {} file(s) failed the integrity check",
            layout.root().display(),
            affected.len()
        );
    }
    (StoreState { records, manifest }, affected)
}
