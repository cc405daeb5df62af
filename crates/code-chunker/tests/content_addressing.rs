use pretty_assertions::assert_eq;
use semindex_code_chunker::{ChunkKind, Chunker, ChunkerConfig, FileChunks, SkipReason};

fn function(name: &str, lines: usize) -> String {
    let mut out = format!("def {name}(items):\n    result = []\n");
    for i in 0..lines.saturating_sub(3) {
        out.push_str(&format!("    result.append(items[{i}])\n"));
    }
    out.push_str("    return result\n");
    out
}

fn ids(chunks: &[semindex_code_chunker::CodeChunk]) -> Vec<String> {
    chunks.iter().map(|c| c.id.to_string()).collect()
}

#[test]
fn small_file_is_not_chunked() {
    let chunker = Chunker::default();
    let small = "import os\nimport sys\n\nprint(os)\nprint(sys)\n";
    assert!(matches!(
        chunker.chunk_str("b.py", small),
        FileChunks::Skipped(SkipReason::TooSmall { .. })
    ));
}

#[test]
fn appending_a_function_keeps_existing_identity() {
    let chunker = Chunker::default();
    let original = function("first", 20);
    let before = chunker.chunk_str("a.py", &original).into_chunks();
    assert_eq!(before.len(), 1);

    let appended = format!("{original}\n\n{}", function("second", 8));
    let after = chunker.chunk_str("a.py", &appended).into_chunks();
    assert_eq!(after.len(), 2);
    assert_eq!(after[0].id, before[0].id);
    assert_eq!(after[1].name.as_deref(), Some("second"));
}

#[test]
fn reverting_an_edit_restores_identity() {
    let chunker = Chunker::default();
    let original = function("stable", 12);
    let edited = original.replace("result = []", "result = list()");

    let first = chunker.chunk_str("a.py", &original).into_chunks();
    let changed = chunker.chunk_str("a.py", &edited).into_chunks();
    let reverted = chunker.chunk_str("a.py", &original).into_chunks();

    assert_ne!(ids(&first), ids(&changed));
    assert_eq!(ids(&first), ids(&reverted));
    assert_eq!(first[0].content_hash, reverted[0].content_hash);
}

#[test]
fn python_methods_are_chunked_with_their_class() {
    let source = "\
class Repository:
    def __init__(self, path):
        self.path = path
        self.items = []

    def add(self, item):
        self.items.append(item)
        return len(self.items)
";
    let chunks = Chunker::default().chunk_str("repo.py", source).into_chunks();
    let summary: Vec<_> = chunks
        .iter()
        .map(|c| (c.kind, c.name.clone().unwrap_or_default(), c.start_line, c.end_line))
        .collect();
    assert_eq!(
        summary,
        vec![
            (ChunkKind::Class, "Repository".to_string(), 1, 8),
            (ChunkKind::Method, "Repository.__init__".to_string(), 2, 4),
            (ChunkKind::Method, "Repository.add".to_string(), 6, 8),
        ]
    );
}

#[test]
fn rust_impl_methods_are_qualified() {
    let source = "\
pub struct Counter {
    value: u64,
}

impl Counter {
    pub fn bump(&mut self) -> u64 {
        self.value += 1;
        self.value
    }
}
";
    let chunks = Chunker::default().chunk_str("src/counter.rs", source).into_chunks();
    let names: Vec<_> = chunks.iter().filter_map(|c| c.name.as_deref()).collect();
    assert_eq!(names, vec!["Counter", "Counter", "Counter.bump"]);
    assert!(chunks.iter().all(|c| c.file_path == "src/counter.rs"));
}

#[test]
fn module_without_units_uses_windows() {
    let source: String = (0..12).map(|i| format!("CONSTANT_{i} = {i}\n")).collect();
    let chunks = Chunker::default().chunk_str("settings.py", &source).into_chunks();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].kind, ChunkKind::Window);
    assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 12));
}

#[test]
fn invalid_config_is_rejected() {
    let config = ChunkerConfig {
        window_lines: 0,
        ..ChunkerConfig::default()
    };
    assert!(Chunker::new(config).is_err());
}
