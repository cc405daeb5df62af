use crate::diff::diff_scope;
use crate::error::Result;
use crate::extract::{extract_files, FileScan};
use crate::filter::PathFilter;
use crate::scanner::{relativize, FileScanner};
use semindex_code_chunker::{Chunker, CodeChunk};
use semindex_embeddings::EmbeddingClient;
use semindex_vector_store::{ChunkRecord, DocumentTemplate, StoreWriter, VectorStore};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// What a reindex pass covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReindexScope {
    All,
    /// Files or directories, absolute or relative to the project root
    Paths(Vec<PathBuf>),
}

impl ReindexScope {
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Paths(mut a), Self::Paths(b)) => {
                for path in b {
                    if !a.contains(&path) {
                        a.push(path);
                    }
                }
                Self::Paths(a)
            }
            _ => Self::All,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::All => "whole project".to_string(),
            Self::Paths(paths) => format!("{} path(s)", paths.len()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReindexStatus {
    /// Every staged chunk was embedded and committed
    Completed,
    /// Committed, but some chunks or files failed and will be retried
    Partial,
    /// Another pass was running; this request was folded into its follow-up
    Coalesced,
}

/// Outcome of a reindex call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReindexReport {
    pub status: ReindexStatus,
    /// Chunks embedded and stored
    pub indexed_chunks: usize,
    /// Chunks swept from the store
    pub deleted_chunks: usize,
    /// Chunks already stored with the same content
    pub skipped: usize,
    /// Files that produced no chunks (too small, binary, unsupported)
    pub skipped_files: usize,
    /// Chunks whose embedding failed; left out of the manifest
    pub failed_chunks: usize,
    pub files_scanned: usize,
    /// Files with at least one stored chunk after the pass
    pub files_indexed: usize,
    pub errors: Vec<String>,
    /// Files to retry because some of their chunks were not stored
    pub retry_paths: Vec<String>,
    pub generation: u64,
    pub duration_ms: u64,
}

impl ReindexReport {
    fn new(status: ReindexStatus) -> Self {
        Self {
            status,
            indexed_chunks: 0,
            deleted_chunks: 0,
            skipped: 0,
            skipped_files: 0,
            failed_chunks: 0,
            files_scanned: 0,
            files_indexed: 0,
            errors: Vec::new(),
            retry_paths: Vec::new(),
            generation: 0,
            duration_ms: 0,
        }
    }

    #[must_use]
    pub fn coalesced() -> Self {
        Self::new(ReindexStatus::Coalesced)
    }

    /// Fold a follow-up pass into this report
    fn absorb(&mut self, other: Self) {
        self.indexed_chunks += other.indexed_chunks;
        self.deleted_chunks += other.deleted_chunks;
        self.skipped += other.skipped;
        self.skipped_files += other.skipped_files;
        self.failed_chunks += other.failed_chunks;
        self.files_scanned += other.files_scanned;
        self.files_indexed = other.files_indexed;
        self.errors.extend(other.errors);
        for path in other.retry_paths {
            if !self.retry_paths.contains(&path) {
                self.retry_paths.push(path);
            }
        }
        self.generation = other.generation;
        self.duration_ms += other.duration_ms;
        if other.status == ReindexStatus::Partial {
            self.status = ReindexStatus::Partial;
        }
    }
}

struct PassRequest {
    scope: ReindexScope,
    force: bool,
}

impl PassRequest {
    fn merge(self, other: Self) -> Self {
        Self {
            scope: self.scope.merge(other.scope),
            force: self.force || other.force,
        }
    }
}

#[derive(Default)]
struct Flight {
    running: bool,
    pending: Option<PassRequest>,
}

impl Flight {
    fn queue(&mut self, request: PassRequest) {
        self.pending = Some(match self.pending.take() {
            Some(pending) => pending.merge(request),
            None => request,
        });
    }
}

/// Resets the running flag if a pass is cancelled or panics
struct RunningGuard<'a> {
    flight: &'a Mutex<Flight>,
    armed: bool,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .running = false;
        }
    }
}

/// Files and directory prefixes a pass is allowed to change
#[derive(Debug, Default)]
struct ScopePlan {
    files: BTreeSet<String>,
    /// Stored files under these prefixes that were not re-observed are swept;
    /// `""` covers the whole project
    prefixes: Vec<String>,
}

impl ScopePlan {
    fn covers(&self, file: &str) -> bool {
        self.prefixes.iter().any(|prefix| {
            prefix.is_empty()
                || file == prefix
                || (file.starts_with(prefix.as_str())
                    && file.as_bytes().get(prefix.len()) == Some(&b'/'))
        })
    }
}

/// Runs mark-sweep reindex passes for one project, one at a time
pub struct IndexCoordinator {
    root: PathBuf,
    store: Arc<VectorStore>,
    client: Arc<dyn EmbeddingClient>,
    chunker: Arc<Chunker>,
    filter: PathFilter,
    template: DocumentTemplate,
    batch_size: usize,
    flight: Mutex<Flight>,
    /// Files the store flagged as untrustworthy, kept until a pass commits them
    rescan: Mutex<BTreeSet<String>>,
}

impl IndexCoordinator {
    #[must_use]
    pub fn new(
        root: PathBuf,
        store: Arc<VectorStore>,
        client: Arc<dyn EmbeddingClient>,
        chunker: Chunker,
        filter: PathFilter,
        template: DocumentTemplate,
        batch_size: usize,
    ) -> Self {
        Self {
            root,
            store,
            client,
            chunker: Arc::new(chunker),
            filter,
            template,
            batch_size: batch_size.max(1),
            flight: Mutex::new(Flight::default()),
            rescan: Mutex::new(BTreeSet::new()),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub const fn filter(&self) -> &PathFilter {
        &self.filter
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .running
    }

    /// Reindex `scope`.
    ///
    /// While a pass is in flight, further calls merge their scope into a single
    /// pending request and return [`ReindexStatus::Coalesced`] at once; the
    /// running call picks that request up as a follow-up pass before returning.
    pub async fn reindex(&self, scope: ReindexScope, force: bool) -> Result<ReindexReport> {
        let request = PassRequest { scope, force };
        let mut next = {
            let mut flight = self.flight.lock().unwrap_or_else(PoisonError::into_inner);
            if flight.running {
                log::debug!(
                    "Reindex of {} already running; request coalesced",
                    self.root.display()
                );
                flight.queue(request);
                return Ok(ReindexReport::coalesced());
            }
            flight.running = true;
            // Scope left behind by a failed pass rides along
            match flight.pending.take() {
                Some(pending) => pending.merge(request),
                None => request,
            }
        };
        let mut guard = RunningGuard {
            flight: &self.flight,
            armed: true,
        };

        let mut report: Option<ReindexReport> = None;
        loop {
            match self.run_pass(&next.scope, next.force).await {
                Ok(pass) => match report.as_mut() {
                    Some(report) => report.absorb(pass),
                    None => report = Some(pass),
                },
                Err(err) => {
                    log::warn!("Reindex of {} failed: {err}", self.root.display());
                    {
                        let mut flight =
                            self.flight.lock().unwrap_or_else(PoisonError::into_inner);
                        flight.queue(next);
                        flight.running = false;
                        guard.armed = false;
                    }
                    match report {
                        // a follow-up failed; what already ran stays committed
                        Some(mut report) => {
                            report.status = ReindexStatus::Partial;
                            report.errors.push(err.to_string());
                            return Ok(report);
                        }
                        None => return Err(err),
                    }
                }
            }

            let pending = {
                let mut flight = self.flight.lock().unwrap_or_else(PoisonError::into_inner);
                let pending = flight.pending.take();
                if pending.is_none() {
                    flight.running = false;
                    guard.armed = false;
                }
                pending
            };
            match pending {
                Some(pending) => {
                    log::info!(
                        "Running follow-up pass for changes that arrived during the last one"
                    );
                    next = pending;
                }
                None => break,
            }
        }
        Ok(report.unwrap_or_else(|| ReindexReport::new(ReindexStatus::Completed)))
    }

    async fn run_pass(&self, scope: &ReindexScope, force: bool) -> Result<ReindexReport> {
        let started = Instant::now();
        log::info!(
            "Reindexing {} ({}{})",
            self.root.display(),
            scope.describe(),
            if force { ", forced" } else { "" }
        );

        let mut report = ReindexReport::new(ReindexStatus::Completed);
        let plan = self.plan(scope, &mut report.errors);
        let mut scans = extract_files(
            &self.root,
            plan.files.iter().cloned(),
            &self.chunker,
            &self.filter,
        )
        .await;

        let mut writer = self.store.writer().await?;

        let flagged = {
            let mut rescan = self.rescan.lock().unwrap_or_else(PoisonError::into_inner);
            rescan.extend(self.store.take_affected_files());
            rescan.clone()
        };
        let extra: Vec<String> = flagged
            .iter()
            .filter(|file| !scans.contains_key(*file))
            .cloned()
            .collect();
        if !extra.is_empty() {
            log::info!("Rescanning {} file(s) flagged by the store", extra.len());
            scans.extend(extract_files(&self.root, extra, &self.chunker, &self.filter).await);
        }

        report.files_scanned = scans.len();
        let mut decided: BTreeMap<String, Vec<CodeChunk>> = BTreeMap::new();
        for (file, scan) in scans {
            match scan {
                FileScan::Chunks(chunks) => {
                    decided.insert(file, chunks);
                }
                FileScan::Skipped(_) => {
                    report.skipped_files += 1;
                    decided.insert(file, Vec::new());
                }
                FileScan::Missing => {
                    decided.insert(file, Vec::new());
                }
                FileScan::Failed(reason) => report.errors.push(reason),
            }
        }
        for file in writer.manifest().files() {
            if plan.covers(&file) && !decided.contains_key(&file) {
                decided.insert(file, Vec::new());
            }
        }

        let diff = diff_scope(writer.manifest(), &decided, force, &flagged);
        report.deleted_chunks = writer.delete(&diff.stale);
        writer.mark_present(&diff.unchanged);
        report.skipped = diff.unchanged.len();

        let mut retry = BTreeSet::new();
        for (index, batch) in diff.embed.chunks(self.batch_size).enumerate() {
            let outcome = self.embed_batch(batch, &mut writer).await?;
            report.indexed_chunks += outcome.stored;
            if outcome.failed > 0 {
                report.failed_chunks += outcome.failed;
                retry.extend(outcome.failed_files);
                let message = format!(
                    "embedding batch {}: {} of {} chunks failed: {}",
                    index + 1,
                    outcome.failed,
                    batch.len(),
                    outcome.first_error.unwrap_or_default()
                );
                log::warn!("{message}");
                report.errors.push(message);
            }
        }

        report.files_indexed = writer.manifest().files().len();
        report.generation = writer.commit().await?;
        self.rescan
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|file| !flagged.contains(file));

        report.retry_paths = retry.into_iter().collect();
        if report.failed_chunks > 0 || !report.errors.is_empty() {
            report.status = ReindexStatus::Partial;
        }
        #[allow(clippy::cast_possible_truncation)]
        {
            report.duration_ms = started.elapsed().as_millis() as u64;
        }
        log::info!(
            "Reindex of {} finished: {} indexed, {} deleted, {} unchanged, {} failed ({}ms)",
            self.root.display(),
            report.indexed_chunks,
            report.deleted_chunks,
            report.skipped,
            report.failed_chunks,
            report.duration_ms
        );
        Ok(report)
    }

    fn plan(&self, scope: &ReindexScope, errors: &mut Vec<String>) -> ScopePlan {
        let scanner = FileScanner::new(&self.root, &self.filter);
        let mut plan = ScopePlan::default();
        match scope {
            ReindexScope::All => {
                plan.files = scanner.scan();
                plan.prefixes.push(String::new());
            }
            ReindexScope::Paths(paths) => {
                for path in paths {
                    let Some(relative) = relativize(&self.root, path) else {
                        errors.push(format!("{}: outside project root", path.display()));
                        continue;
                    };
                    let absolute = self.root.join(&relative);
                    if relative.is_empty() || absolute.is_dir() {
                        plan.files.extend(scanner.scan_dir(&absolute));
                        plan.prefixes.push(relative);
                    } else {
                        if !absolute.exists() {
                            // may have been a directory
                            plan.prefixes.push(relative.clone());
                        }
                        plan.files.insert(relative);
                    }
                }
            }
        }
        plan
    }

    /// Embed one batch and stage + flush whatever succeeded
    async fn embed_batch(
        &self,
        batch: &[CodeChunk],
        writer: &mut StoreWriter<'_>,
    ) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        let mut texts = Vec::with_capacity(batch.len());
        let mut rendered = Vec::with_capacity(batch.len());
        for chunk in batch {
            match self.template.render_chunk(chunk) {
                Ok(text) => {
                    texts.push(text);
                    rendered.push(chunk);
                }
                Err(err) => outcome.fail(chunk, err.to_string()),
            }
        }

        let excerpt_chars = self.chunker.config().excerpt_chars;
        let mut results = self.client.embed_batch(&texts).await.into_iter();
        let mut records = Vec::with_capacity(rendered.len());
        for chunk in rendered {
            match results.next() {
                Some(Ok(embedding)) => {
                    records.push(ChunkRecord::from_chunk(chunk, embedding, excerpt_chars));
                }
                Some(Err(err)) => outcome.fail(chunk, err.to_string()),
                None => outcome.fail(chunk, "provider returned fewer vectors than inputs".into()),
            }
        }

        if !records.is_empty() {
            outcome.stored = writer.upsert(records)?;
            writer.flush().await?;
        }
        Ok(outcome)
    }
}

#[derive(Default)]
struct BatchOutcome {
    stored: usize,
    failed: usize,
    failed_files: BTreeSet<String>,
    first_error: Option<String>,
}

impl BatchOutcome {
    fn fail(&mut self, chunk: &CodeChunk, reason: String) {
        self.failed += 1;
        self.failed_files.insert(chunk.file_path.clone());
        self.first_error.get_or_insert(reason);
    }
}
