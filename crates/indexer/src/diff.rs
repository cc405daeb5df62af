//! Mark-sweep diff between a scan and the stored manifest.

use semindex_code_chunker::{ChunkId, CodeChunk};
use semindex_vector_store::Manifest;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Work implied by one pass
#[derive(Debug, Default)]
pub(crate) struct ScopeDiff {
    /// New or changed chunks; need an embedding
    pub embed: Vec<CodeChunk>,
    /// Already stored with the same content; only marked present
    pub unchanged: Vec<ChunkId>,
    /// Stored for an in-scope file but no longer produced by it
    pub stale: Vec<ChunkId>,
}

/// Diff the chunks currently produced by each in-scope file against the manifest.
///
/// `decided` maps every file whose stored state this pass is allowed to change
/// to its current chunks (empty for deleted or skipped files). Files outside it
/// are not touched. With `force`, every current chunk is re-embedded; files in
/// `force_files` are re-embedded even when their hashes match.
pub(crate) fn diff_scope(
    manifest: &Manifest,
    decided: &BTreeMap<String, Vec<CodeChunk>>,
    force: bool,
    force_files: &BTreeSet<String>,
) -> ScopeDiff {
    let mut stored: BTreeMap<&str, Vec<&ChunkId>> = BTreeMap::new();
    for (id, entry) in &manifest.entries {
        if decided.contains_key(&entry.file_path) {
            stored.entry(entry.file_path.as_str()).or_default().push(id);
        }
    }

    let mut diff = ScopeDiff::default();
    for (file, chunks) in decided {
        let current: HashSet<&ChunkId> = chunks.iter().map(|c| &c.id).collect();
        let refresh = force || force_files.contains(file);
        for chunk in chunks {
            match manifest.entries.get(&chunk.id) {
                Some(entry) if !refresh && entry.content_hash == chunk.content_hash => {
                    diff.unchanged.push(chunk.id.clone());
                }
                _ => diff.embed.push(chunk.clone()),
            }
        }
        if let Some(ids) = stored.get(file.as_str()) {
            diff.stale.extend(
                ids.iter()
                    .filter(|id| !current.contains(**id))
                    .map(|id| (*id).clone()),
            );
        }
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use semindex_code_chunker::{ChunkKind, Language};
    use semindex_vector_store::{ManifestEntry, StoreDescriptor};

    fn chunk(path: &str, start: usize, text: &str) -> CodeChunk {
        CodeChunk::new(
            path,
            start,
            start + 2,
            text.to_string(),
            Language::Python,
            ChunkKind::Function,
            None,
        )
    }

    fn manifest_with(chunks: &[&CodeChunk]) -> Manifest {
        let mut manifest = Manifest::empty(StoreDescriptor {
            provider: "fake".to_string(),
            model: "m".to_string(),
            dimension: 4,
            template_hash: 0,
        });
        for c in chunks {
            manifest.entries.insert(
                c.id.clone(),
                ManifestEntry {
                    file_path: c.file_path.clone(),
                    content_hash: c.content_hash.clone(),
                    marker: 1,
                },
            );
        }
        manifest
    }

    #[test]
    fn classifies_new_unchanged_and_stale() {
        let kept = chunk("a.py", 1, "def a(): pass");
        let removed = chunk("a.py", 5, "def old(): pass");
        let added = chunk("a.py", 9, "def new(): pass");
        let other = chunk("b.py", 1, "def b(): pass");
        let manifest = manifest_with(&[&kept, &removed, &other]);

        let decided = BTreeMap::from([("a.py".to_string(), vec![kept.clone(), added.clone()])]);
        let diff = diff_scope(&manifest, &decided, false, &BTreeSet::new());

        assert_eq!(diff.embed, vec![added]);
        assert_eq!(diff.unchanged, vec![kept.id]);
        assert_eq!(diff.stale, vec![removed.id]);
    }

    #[test]
    fn deleted_file_sweeps_only_its_chunks() {
        let a = chunk("a.py", 1, "def a(): pass");
        let b = chunk("b.py", 1, "def b(): pass");
        let manifest = manifest_with(&[&a, &b]);

        let decided = BTreeMap::from([("b.py".to_string(), Vec::new())]);
        let diff = diff_scope(&manifest, &decided, false, &BTreeSet::new());

        assert!(diff.embed.is_empty());
        assert!(diff.unchanged.is_empty());
        assert_eq!(diff.stale, vec![b.id]);
    }

    #[test]
    fn force_re_embeds_everything_in_scope() {
        let a = chunk("a.py", 1, "def a(): pass");
        let manifest = manifest_with(&[&a]);

        let decided = BTreeMap::from([("a.py".to_string(), vec![a.clone()])]);
        let diff = diff_scope(&manifest, &decided, true, &BTreeSet::new());

        assert_eq!(diff.embed, vec![a]);
        assert!(diff.unchanged.is_empty());
        assert!(diff.stale.is_empty());
    }

    #[test]
    fn flagged_files_are_re_embedded_alone() {
        let a = chunk("a.py", 1, "def a(): pass");
        let b = chunk("b.py", 1, "def b(): pass");
        let manifest = manifest_with(&[&a, &b]);

        let decided = BTreeMap::from([
            ("a.py".to_string(), vec![a.clone()]),
            ("b.py".to_string(), vec![b.clone()]),
        ]);
        let flagged = BTreeSet::from(["b.py".to_string()]);
        let diff = diff_scope(&manifest, &decided, false, &flagged);

        assert_eq!(diff.embed, vec![b]);
        assert_eq!(diff.unchanged, vec![a.id]);
        assert!(diff.stale.is_empty());
    }
}
