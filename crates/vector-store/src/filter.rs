use crate::record::ChunkRecord;
use semindex_code_chunker::{ChunkKind, Language};
use serde::{Deserialize, Serialize};

/// Metadata constraints applied before ranking.
///
/// Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryFilter {
    pub language: Option<Language>,
    pub kind: Option<ChunkKind>,
    /// Case-insensitive substring of the chunk name; unnamed chunks never match
    pub name_contains: Option<String>,
    /// Project-relative directory or file, matched on whole path components
    pub path_prefix: Option<String>,
}

impl QueryFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.language.is_none()
            && self.kind.is_none()
            && self.name_contains.is_none()
            && self.path_prefix.is_none()
    }

    #[must_use]
    pub fn matches(&self, record: &ChunkRecord) -> bool {
        if self.language.is_some_and(|language| language != record.language) {
            return false;
        }
        if self.kind.is_some_and(|kind| kind != record.kind) {
            return false;
        }
        if let Some(needle) = &self.name_contains {
            let needle = needle.to_lowercase();
            let named = record
                .name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(&needle));
            if !named {
                return false;
            }
        }
        match self.path_prefix.as_deref().map(|p| p.trim_matches('/')) {
            None | Some("") => true,
            Some(prefix) => {
                record.file_path == prefix
                    || (record.file_path.starts_with(prefix)
                        && record.file_path.as_bytes().get(prefix.len()) == Some(&b'/'))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semindex_code_chunker::CodeChunk;

    fn record(path: &str, language: Language, kind: ChunkKind, name: Option<&str>) -> ChunkRecord {
        let chunk = CodeChunk::new(
            path,
            1,
            4,
            "body".to_string(),
            language,
            kind,
            name.map(str::to_string),
        );
        ChunkRecord::from_chunk(&chunk, vec![1.0], 100)
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = QueryFilter::default();
        assert!(filter.is_empty());
        assert!(filter.matches(&record("a.rs", Language::Rust, ChunkKind::Window, None)));
    }

    #[test]
    fn fields_combine_with_and() {
        let filter = QueryFilter {
            language: Some(Language::Python),
            kind: Some(ChunkKind::Method),
            name_contains: Some("LOAD".to_string()),
            path_prefix: None,
        };
        let method = record("repo.py", Language::Python, ChunkKind::Method, Some("Repo.load_all"));
        assert!(filter.matches(&method));
        assert!(!filter.matches(&record(
            "repo.py",
            Language::Python,
            ChunkKind::Function,
            Some("load")
        )));
        assert!(!filter.matches(&record(
            "repo.rs",
            Language::Rust,
            ChunkKind::Method,
            Some("load")
        )));
        assert!(!filter.matches(&record("repo.py", Language::Python, ChunkKind::Method, None)));
    }

    #[test]
    fn path_prefix_matches_whole_components() {
        let filter = QueryFilter {
            path_prefix: Some("src/api/".to_string()),
            ..QueryFilter::default()
        };
        let function = |path| record(path, Language::Rust, ChunkKind::Function, Some("f"));
        assert!(filter.matches(&function("src/api/routes.rs")));
        assert!(!filter.matches(&function("src/apis.rs")));
        assert!(!filter.matches(&function("lib.rs")));
    }
}
