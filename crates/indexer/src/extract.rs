//! Per-file extraction with failures isolated to the file.

use crate::error::IndexerError;
use crate::filter::PathFilter;
use futures::stream::{self, StreamExt};
use semindex_code_chunker::{Chunker, CodeChunk, FileChunks, Language, SkipReason};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const MAX_CONCURRENT_FILES: usize = 16;

/// What the current on-disk state of one file yields
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FileScan {
    Chunks(Vec<CodeChunk>),
    Skipped(SkipReason),
    /// Not on disk (deleted or renamed away)
    Missing,
    /// Could not be read; stored chunks for it are left alone
    Failed(String),
}

/// Extract every file in `files` (project-relative), at most
/// [`MAX_CONCURRENT_FILES`] at a time
pub(crate) async fn extract_files(
    root: &Path,
    files: impl IntoIterator<Item = String>,
    chunker: &Arc<Chunker>,
    filter: &PathFilter,
) -> BTreeMap<String, FileScan> {
    let tasks = files.into_iter().map(|relative| {
        let absolute = root.join(&relative);
        let chunker = Arc::clone(chunker);
        let language = filter.language_for(Path::new(&relative));
        async move {
            let scan = match language {
                Some(language) => extract_file(absolute, &relative, language, chunker).await,
                None => FileScan::Skipped(SkipReason::UnsupportedExtension),
            };
            (relative, scan)
        }
    });
    stream::iter(tasks)
        .buffer_unordered(MAX_CONCURRENT_FILES)
        .collect()
        .await
}

async fn extract_file(
    absolute: PathBuf,
    relative: &str,
    language: Language,
    chunker: Arc<Chunker>,
) -> FileScan {
    let max_bytes = chunker.config().max_file_bytes;
    match tokio::fs::metadata(&absolute).await {
        Ok(meta) if meta.is_dir() => return FileScan::Missing,
        Ok(meta) if meta.len() > max_bytes => {
            return FileScan::Skipped(SkipReason::TooLarge { bytes: meta.len() });
        }
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return FileScan::Missing,
        Err(err) => return failed(relative, err),
    }

    let bytes = match tokio::fs::read(&absolute).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return FileScan::Missing,
        Err(err) => return failed(relative, err),
    };

    let path = relative.to_string();
    let outcome = tokio::task::spawn_blocking(move || {
        chunker.chunk_bytes_as(&path, &bytes, language)
    })
    .await;
    match outcome {
        Ok(FileChunks::Chunks(chunks)) => FileScan::Chunks(chunks),
        Ok(FileChunks::Skipped(reason)) => {
            log::debug!("Skipping {relative}: {reason}");
            FileScan::Skipped(reason)
        }
        Err(err) => failed(relative, format!("chunking task failed: {err}")),
    }
}

fn failed(relative: &str, reason: impl ToString) -> FileScan {
    let err = IndexerError::extraction(relative, reason);
    log::warn!("{err}");
    FileScan::Failed(err.to_string())
}
