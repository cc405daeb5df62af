use crate::error::{ChunkerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Language (or document format) of an indexable file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Go,
    Java,
    C,
    Cpp,
    CSharp,
    Ruby,
    Swift,
    Kotlin,
    Scala,
    Vue,
    Svelte,
    Markdown,
    Text,
    Yaml,
    Json,
    Toml,
    Unknown,
}

impl Language {
    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "rs" => Self::Rust,
            "py" | "pyw" => Self::Python,
            "js" | "mjs" | "cjs" | "jsx" => Self::JavaScript,
            "ts" | "mts" | "cts" => Self::TypeScript,
            "tsx" => Self::Tsx,
            "go" => Self::Go,
            "java" => Self::Java,
            "c" | "h" => Self::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Self::Cpp,
            "cs" => Self::CSharp,
            "rb" => Self::Ruby,
            "swift" => Self::Swift,
            "kt" | "kts" => Self::Kotlin,
            "scala" => Self::Scala,
            "vue" => Self::Vue,
            "svelte" => Self::Svelte,
            "md" | "markdown" => Self::Markdown,
            "txt" => Self::Text,
            "yaml" | "yml" => Self::Yaml,
            "json" => Self::Json,
            "toml" => Self::Toml,
            _ => Self::Unknown,
        }
    }

    /// Detect language from file path
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(Self::Unknown, Self::from_extension)
    }

    /// Get language name as string
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::Go => "go",
            Self::Java => "java",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::CSharp => "csharp",
            Self::Ruby => "ruby",
            Self::Swift => "swift",
            Self::Kotlin => "kotlin",
            Self::Scala => "scala",
            Self::Vue => "vue",
            Self::Svelte => "svelte",
            Self::Markdown => "markdown",
            Self::Text => "text",
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Toml => "toml",
            Self::Unknown => "unknown",
        }
    }

    /// Whether files of this kind are indexed at all
    pub const fn is_indexable(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Check if this language is supported for AST parsing
    pub const fn supports_ast(self) -> bool {
        matches!(
            self,
            Self::Rust | Self::Python | Self::JavaScript | Self::TypeScript | Self::Tsx
        )
    }

    /// Get Tree-sitter language instance
    pub fn tree_sitter_language(self) -> Result<tree_sitter::Language> {
        match self {
            Self::Rust => Ok(tree_sitter_rust::LANGUAGE.into()),
            Self::Python => Ok(tree_sitter_python::LANGUAGE.into()),
            Self::JavaScript => Ok(tree_sitter_javascript::LANGUAGE.into()),
            Self::TypeScript => Ok(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Self::Tsx => Ok(tree_sitter_typescript::LANGUAGE_TSX.into()),
            _ => Err(ChunkerError::unsupported_language(self.as_str())),
        }
    }
}

/// Whether a path has an extension the index cares about
pub fn is_indexable_path(path: impl AsRef<Path>) -> bool {
    Language::from_path(path).is_indexable()
}

#[cfg(test)]
mod tests {
    use super::{is_indexable_path, Language};

    #[test]
    fn extensions_are_case_insensitive() {
        for (ext, expected) in [
            ("RS", Language::Rust),
            ("Py", Language::Python),
            ("tsx", Language::Tsx),
            ("yml", Language::Yaml),
            ("exe", Language::Unknown),
        ] {
            assert_eq!(Language::from_extension(ext), expected, "{ext}");
        }
    }

    #[test]
    fn path_detection_uses_the_last_extension() {
        assert_eq!(Language::from_path("src/lib.rs"), Language::Rust);
        assert_eq!(Language::from_path("web/app.test.ts"), Language::TypeScript);
        assert_eq!(Language::from_path("docs/README.md"), Language::Markdown);
        assert_eq!(Language::from_path("LICENSE"), Language::Unknown);
    }

    #[test]
    fn only_known_text_formats_are_indexable() {
        assert!(is_indexable_path("cmd/server/main.go"));
        assert!(is_indexable_path("Cargo.toml"));
        assert!(!is_indexable_path("assets/logo.png"));
        assert!(!is_indexable_path("Makefile"));
    }

    #[test]
    fn grammars_exist_exactly_for_ast_languages() {
        for language in [
            Language::Rust,
            Language::Python,
            Language::JavaScript,
            Language::TypeScript,
            Language::Tsx,
            Language::Go,
            Language::Markdown,
        ] {
            assert_eq!(
                language.tree_sitter_language().is_ok(),
                language.supports_ast(),
                "{}",
                language.as_str()
            );
        }
    }
}
