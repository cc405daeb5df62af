//! Fixed-size line windows, used when a file has no parsable structure.

use crate::chunk::{ChunkKind, CodeChunk};
use crate::config::ChunkerConfig;
use crate::language::Language;

/// Window bounds over `first..=last` (0-based line indices).
///
/// Consecutive windows share `window_overlap` lines. A trailing window shorter than
/// `min_chunk_lines` is dropped unless it is the only one.
pub(crate) fn window_ranges(first: usize, last: usize, config: &ChunkerConfig) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    if last < first {
        return ranges;
    }

    let mut start = first;
    loop {
        let end = (start + config.window_lines - 1).min(last);
        let len = end + 1 - start;
        if len >= config.min_chunk_lines || ranges.is_empty() {
            ranges.push((start, end));
        }
        if end == last {
            break;
        }
        start += config.window_step();
    }
    ranges
}

/// Split `lines[first..=last]` into window chunks
pub(crate) fn window_chunks(
    lines: &[&str],
    first: usize,
    last: usize,
    file_path: &str,
    language: Language,
    name: Option<&str>,
    config: &ChunkerConfig,
) -> Vec<CodeChunk> {
    window_ranges(first, last, config)
        .into_iter()
        .filter_map(|(start, end)| {
            let text = lines[start..=end].join("\n");
            if text.trim().is_empty() {
                return None;
            }
            Some(CodeChunk::new(
                file_path,
                start + 1,
                end + 1,
                text,
                language,
                ChunkKind::Window,
                name.map(str::to_string),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(window: usize, overlap: usize) -> ChunkerConfig {
        ChunkerConfig {
            window_lines: window,
            window_overlap: overlap,
            max_chunk_lines: window.max(200),
            ..ChunkerConfig::default()
        }
    }

    #[test]
    fn single_window_for_short_range() {
        assert_eq!(window_ranges(0, 19, &config(50, 10)), vec![(0, 19)]);
    }

    #[test]
    fn windows_overlap_and_stop_at_end() {
        assert_eq!(
            window_ranges(0, 59, &config(50, 10)),
            vec![(0, 49), (40, 59)]
        );
        assert_eq!(window_ranges(0, 49, &config(50, 10)), vec![(0, 49)]);
    }

    #[test]
    fn tiny_trailing_window_is_dropped() {
        // 16..=19 has only 4 lines
        let cfg = ChunkerConfig {
            min_chunk_lines: 5,
            ..config(10, 2)
        };
        assert_eq!(window_ranges(0, 19, &cfg), vec![(0, 9), (8, 17)]);
    }

    #[test]
    fn blank_windows_are_skipped() {
        let lines = vec![""; 12];
        let chunks = window_chunks(&lines, 0, 11, "a.txt", Language::Text, None, &config(50, 10));
        assert!(chunks.is_empty());
    }
}
