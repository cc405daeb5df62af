use crate::config::FilterConfig;
use crate::error::{IndexerError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use semindex_code_chunker::Language;
use std::collections::HashSet;
use std::path::{Component, Path};

/// Dependency, build and VCS directories never worth indexing
pub const IGNORED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".semindex",
    "target",
    "node_modules",
    "dist",
    "build",
    "out",
    "coverage",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".tox",
    ".venv",
    "venv",
    ".next",
    ".nuxt",
    ".idea",
    ".vscode",
];

/// Decides which project-relative paths take part in indexing
#[derive(Debug, Clone)]
pub struct PathFilter {
    exclude_dirs: HashSet<String>,
    include_extensions: HashSet<String>,
    exclude_globs: GlobSet,
}

impl Default for PathFilter {
    fn default() -> Self {
        Self {
            exclude_dirs: IGNORED_DIRS.iter().map(ToString::to_string).collect(),
            include_extensions: HashSet::new(),
            exclude_globs: GlobSet::empty(),
        }
    }
}

impl PathFilter {
    pub fn new(config: &FilterConfig) -> Result<Self> {
        let mut filter = Self::default();
        filter
            .exclude_dirs
            .extend(config.exclude_dirs.iter().map(|d| d.trim_matches('/').to_string()));
        filter.include_extensions.extend(
            config
                .include_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase()),
        );

        let mut globs = GlobSetBuilder::new();
        for pattern in &config.exclude_globs {
            let glob = Glob::new(pattern).map_err(|err| {
                IndexerError::Config(format!("invalid exclude glob '{pattern}': {err}"))
            })?;
            globs.add(glob);
        }
        filter.exclude_globs = globs
            .build()
            .map_err(|err| IndexerError::Config(err.to_string()))?;
        Ok(filter)
    }

    #[must_use]
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.exclude_dirs.contains(name)
    }

    /// True when some directory component of `relative` is excluded, or a glob matches
    #[must_use]
    pub fn is_excluded(&self, relative: &Path) -> bool {
        let mut components = relative.components().peekable();
        while let Some(component) = components.next() {
            let is_last = components.peek().is_none();
            match component {
                Component::Normal(name) if !is_last => {
                    if name.to_str().is_some_and(|n| self.is_excluded_dir(n)) {
                        return true;
                    }
                }
                Component::ParentDir => return true,
                _ => {}
            }
        }
        self.exclude_globs.is_match(relative)
    }

    /// Language to chunk `relative` with, or `None` when the file is not indexed
    #[must_use]
    pub fn language_for(&self, relative: &Path) -> Option<Language> {
        if self.is_excluded(relative) {
            return None;
        }
        let language = Language::from_path(relative);
        if language.is_indexable() {
            return Some(language);
        }
        relative
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| self.include_extensions.contains(&ext.to_lowercase()))
            .map(|_| Language::Text)
    }

    #[must_use]
    pub fn is_relevant(&self, relative: &Path) -> bool {
        self.language_for(relative).is_some()
    }
}
