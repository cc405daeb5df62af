use crate::filter::PathFilter;
use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// `.gitignore`-aware walk of a project tree
#[derive(Debug, Clone)]
pub struct FileScanner<'a> {
    root: &'a Path,
    filter: &'a PathFilter,
}

impl<'a> FileScanner<'a> {
    #[must_use]
    pub const fn new(root: &'a Path, filter: &'a PathFilter) -> Self {
        Self { root, filter }
    }

    /// Every indexable file under the project root
    #[must_use]
    pub fn scan(&self) -> BTreeSet<String> {
        self.scan_dir(self.root)
    }

    /// Indexable files under `dir` (absolute, inside the root), as relative paths
    #[must_use]
    pub fn scan_dir(&self, dir: &Path) -> BTreeSet<String> {
        let filter = self.filter.clone();
        let walker = WalkBuilder::new(dir)
            .hidden(false)
            .git_ignore(true)
            .git_exclude(true)
            .require_git(false)
            .ignore(true)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                !(is_dir
                    && entry.depth() > 0
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| filter.is_excluded_dir(name)))
            })
            .build();

        let mut files = BTreeSet::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("Walker error under {}: {err}", dir.display());
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let relative = normalize_path(self.root, entry.path());
            if self.filter.is_relevant(Path::new(&relative)) {
                files.insert(relative);
            }
        }
        log::debug!("Scanned {}: {} indexable files", dir.display(), files.len());
        files
    }
}

/// Project-relative path with `/` separators
#[must_use]
pub fn normalize_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut normalized = relative.to_string_lossy().to_string();
    if normalized.contains('\\') {
        normalized = normalized.replace('\\', "/");
    }
    normalized
}

/// Resolve a caller-supplied path (absolute or root-relative) to a relative one.
///
/// Returns `None` for paths outside the root.
#[must_use]
pub fn relativize(root: &Path, path: &Path) -> Option<String> {
    let absolute: PathBuf = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };
    let absolute = absolute.canonicalize().unwrap_or(absolute);
    let relative = absolute.strip_prefix(root).ok()?;
    let normalized = normalize_path(Path::new(""), relative);
    let normalized = normalized.trim_start_matches("./").trim_end_matches('/');
    if normalized.split('/').any(|part| part == "..") {
        return None;
    }
    Some(normalized.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x\n").unwrap();
    }

    #[test]
    fn scan_respects_ignore_rules() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        for rel in [
            "src/lib.rs",
            "src/util/mod.rs",
            "node_modules/pkg/index.js",
            "target/debug/gen.rs",
            "vendor/skip.py",
            "image.png",
        ] {
            touch(&root, rel);
        }
        fs::write(root.join(".gitignore"), "vendor/\n").unwrap();

        let filter = PathFilter::default();
        let files = FileScanner::new(&root, &filter).scan();
        assert_eq!(
            files.into_iter().collect::<Vec<_>>(),
            vec!["src/lib.rs".to_string(), "src/util/mod.rs".to_string()]
        );
    }

    #[test]
    fn scan_dir_is_relative_to_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        touch(&root, "a/one.py");
        touch(&root, "b/two.py");

        let filter = PathFilter::default();
        let files = FileScanner::new(&root, &filter).scan_dir(&root.join("b"));
        assert_eq!(files.into_iter().collect::<Vec<_>>(), vec!["b/two.py".to_string()]);
    }

    #[test]
    fn relativize_handles_absolute_relative_and_outside() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        touch(&root, "src/a.py");

        assert_eq!(relativize(&root, Path::new("src/a.py")).as_deref(), Some("src/a.py"));
        assert_eq!(
            relativize(&root, &root.join("src/a.py")).as_deref(),
            Some("src/a.py")
        );
        // deleted files still resolve
        assert_eq!(relativize(&root, Path::new("gone.py")).as_deref(), Some("gone.py"));
        assert_eq!(relativize(&root, Path::new("/definitely/elsewhere.py")), None);
    }
}
