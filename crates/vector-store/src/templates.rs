use crate::error::{Result, VectorStoreError};
use semindex_code_chunker::CodeChunk;
use serde::{Deserialize, Serialize};

const DEFAULT_DOCUMENT_TEMPLATE: &str =
    "File: {path}\n{kind}: {name}\nLines: {start_line}-{end_line}\n\n{text}";

const ALLOWED_PLACEHOLDERS: &str =
    "text, path, language, kind, name, start_line, end_line, chunk_id";

/// Turns a chunk into the text that gets embedded.
///
/// Placeholders are written `{name}`; `{{` and `}}` are literal braces. Output is
/// capped at `max_chars` bytes on a char boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentTemplate {
    pub document: String,
    pub query: String,
    pub max_chars: usize,
}

impl Default for DocumentTemplate {
    fn default() -> Self {
        Self {
            document: DEFAULT_DOCUMENT_TEMPLATE.to_string(),
            query: "{text}".to_string(),
            max_chars: 8192,
        }
    }
}

impl DocumentTemplate {
    pub fn validate(&self) -> Result<()> {
        if !(256..=200_000).contains(&self.max_chars) {
            return Err(VectorStoreError::InvalidTemplate(format!(
                "max_chars must be in [256, 200000] (got {})",
                self.max_chars
            )));
        }
        for template in [&self.document, &self.query] {
            for name in extract_placeholders(template)? {
                if !is_allowed_placeholder(&name) {
                    return Err(unsupported(&name));
                }
            }
        }
        Ok(())
    }

    /// Stable fingerprint; a change means stored vectors are stale
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let repr = format!(
            "max_chars={}\ndocument={}\nquery={}\n",
            self.max_chars, self.document, self.query
        );
        fnv1a64(repr.as_bytes())
    }

    pub fn render_chunk(&self, chunk: &CodeChunk) -> Result<String> {
        let name = chunk.name.as_deref().unwrap_or("");
        let start_line = chunk.start_line.to_string();
        let end_line = chunk.end_line.to_string();
        render_template(&self.document, self.max_chars, |key| match key {
            "text" => Some(chunk.content.as_str()),
            "path" => Some(chunk.file_path.as_str()),
            "language" => Some(chunk.language.as_str()),
            "kind" => Some(chunk.kind.as_str()),
            "name" => Some(name),
            "start_line" => Some(start_line.as_str()),
            "end_line" => Some(end_line.as_str()),
            "chunk_id" => Some(chunk.id.as_str()),
            _ => None,
        })
    }

    pub fn render_query(&self, text: &str) -> Result<String> {
        render_template(&self.query, self.max_chars, |key| match key {
            "text" => Some(text),
            _ => None,
        })
    }
}

fn unsupported(name: &str) -> VectorStoreError {
    VectorStoreError::InvalidTemplate(format!(
        "unsupported placeholder '{{{name}}}'. Allowed: {ALLOWED_PLACEHOLDERS}"
    ))
}

fn is_allowed_placeholder(name: &str) -> bool {
    matches!(
        name,
        "text" | "path" | "language" | "kind" | "name" | "start_line" | "end_line" | "chunk_id"
    )
}

/// Scan `{...}` and return the placeholder name, consuming the closing brace
fn read_placeholder(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<String> {
    let mut name = String::new();
    loop {
        match chars.next() {
            Some('}') => break,
            Some('{') => {
                return Err(VectorStoreError::InvalidTemplate(
                    "nested '{' inside placeholder".into(),
                ))
            }
            Some(c) => name.push(c),
            None => {
                return Err(VectorStoreError::InvalidTemplate(
                    "unterminated '{...}' placeholder".into(),
                ))
            }
        }
    }
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(VectorStoreError::InvalidTemplate(
            "empty placeholder '{}'".into(),
        ));
    }
    Ok(name)
}

fn extract_placeholders(template: &str) -> Result<Vec<String>> {
    let mut placeholders = Vec::new();
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
            }
            '{' => placeholders.push(read_placeholder(&mut chars)?),
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
            }
            '}' => return Err(VectorStoreError::InvalidTemplate("stray '}'".into())),
            _ => {}
        }
    }
    Ok(placeholders)
}

fn render_template<'a>(
    template: &str,
    max_chars: usize,
    mut resolve: impl FnMut(&str) -> Option<&'a str>,
) -> Result<String> {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        if out.len() >= max_chars {
            break;
        }
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                push_str_bounded(&mut out, "{", max_chars);
            }
            '{' => {
                let name = read_placeholder(&mut chars)?;
                if !is_allowed_placeholder(&name) {
                    return Err(unsupported(&name));
                }
                push_str_bounded(&mut out, resolve(&name).unwrap_or(""), max_chars);
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                push_str_bounded(&mut out, "}", max_chars);
            }
            '}' => return Err(VectorStoreError::InvalidTemplate("stray '}'".into())),
            other => {
                let mut buf = [0u8; 4];
                push_str_bounded(&mut out, other.encode_utf8(&mut buf), max_chars);
            }
        }
    }
    Ok(out)
}

fn push_str_bounded(out: &mut String, value: &str, max_chars: usize) {
    let remaining = max_chars.saturating_sub(out.len());
    if value.len() <= remaining {
        out.push_str(value);
        return;
    }
    let mut end = 0;
    for (i, c) in value.char_indices() {
        if i + c.len_utf8() > remaining {
            break;
        }
        end = i + c.len_utf8();
    }
    out.push_str(&value[..end]);
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 14_695_981_039_346_656_037;
    const PRIME: u64 = 1_099_511_628_211;
    let mut hash = OFFSET;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use semindex_code_chunker::{ChunkKind, Language};

    fn chunk() -> CodeChunk {
        CodeChunk::new(
            "src/auth.py",
            10,
            12,
            "def login():\n    pass".to_string(),
            Language::Python,
            ChunkKind::Function,
            Some("login".to_string()),
        )
    }

    #[test]
    fn default_template_has_header() {
        let rendered = DocumentTemplate::default().render_chunk(&chunk()).unwrap();
        assert_eq!(
            rendered,
            "File: src/auth.py\nfunction: login\nLines: 10-12\n\ndef login():\n    pass"
        );
    }

    #[test]
    fn output_is_bounded() {
        let template = DocumentTemplate {
            document: "{text}{text}".to_string(),
            max_chars: 256,
            ..DocumentTemplate::default()
        };
        let mut long = chunk();
        long.content = "é".repeat(500);
        let rendered = template.render_chunk(&long).unwrap();
        assert!(rendered.len() <= 256);
        assert!(rendered.chars().all(|c| c == 'é'));
    }

    #[test]
    fn bad_templates_are_rejected() {
        let bad = |document: &str| DocumentTemplate {
            document: document.to_string(),
            ..DocumentTemplate::default()
        };
        assert!(bad("{unknown}").validate().is_err());
        assert!(bad("{text").validate().is_err());
        assert!(bad("text}").validate().is_err());
        assert!(bad("{{literal}} {text}").validate().is_ok());
    }

    #[test]
    fn fingerprint_tracks_changes() {
        let a = DocumentTemplate::default();
        let b = DocumentTemplate {
            document: "{text}".to_string(),
            ..DocumentTemplate::default()
        };
        assert_eq!(a.fingerprint(), DocumentTemplate::default().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
