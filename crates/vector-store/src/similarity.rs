use crate::record::{ChunkRecord, SearchHit};
use ndarray::ArrayView1;

/// Cosine similarity; zero when either vector has no magnitude
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let a = ArrayView1::from(a);
    let b = ArrayView1::from(b);
    let norm = a.dot(&a).sqrt() * b.dot(&b).sqrt();
    if norm == 0.0 {
        0.0
    } else {
        a.dot(&b) / norm
    }
}

/// Best `top_k` records for `query`, ordered by score, then path, then line
pub(crate) fn rank<'a>(
    records: impl Iterator<Item = &'a ChunkRecord>,
    query: &[f32],
    top_k: usize,
) -> Vec<SearchHit> {
    if top_k == 0 {
        return Vec::new();
    }
    let query_view = ArrayView1::from(query);
    let query_norm = query_view.dot(&query_view).sqrt();

    let mut scored: Vec<(f32, &ChunkRecord)> = records
        .filter(|record| record.embedding.len() == query.len())
        .map(|record| {
            let v = ArrayView1::from(record.embedding.as_slice());
            let norm = v.dot(&v).sqrt() * query_norm;
            let score = if norm == 0.0 {
                0.0
            } else {
                v.dot(&query_view) / norm
            };
            (score, record)
        })
        .collect();

    scored.sort_by(|(sa, ra), (sb, rb)| {
        sb.total_cmp(sa)
            .then_with(|| ra.file_path.cmp(&rb.file_path))
            .then_with(|| ra.start_line.cmp(&rb.start_line))
    });
    scored
        .into_iter()
        .take(top_k)
        .map(|(score, record)| SearchHit::from_record(record, score))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use semindex_code_chunker::{ChunkId, ChunkKind, Language};

    fn record(path: &str, start: usize, embedding: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            id: ChunkId::new(path, start, start + 2, "abcd"),
            file_path: path.to_string(),
            start_line: start,
            end_line: start + 2,
            content_hash: "abcd".to_string(),
            language: Language::Python,
            kind: ChunkKind::Function,
            name: None,
            excerpt: String::new(),
            embedding,
        }
    }

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn ranking_orders_by_score_then_location() {
        let records = vec![
            record("b.py", 1, vec![1.0, 0.0]),
            record("a.py", 9, vec![1.0, 0.0]),
            record("a.py", 1, vec![1.0, 0.0]),
            record("c.py", 1, vec![0.0, 1.0]),
        ];
        let hits = rank(records.iter(), &[1.0, 0.0], 10);
        let order: Vec<_> = hits.iter().map(|h| (h.file_path.as_str(), h.start_line)).collect();
        assert_eq!(order, vec![("a.py", 1), ("a.py", 9), ("b.py", 1), ("c.py", 1)]);

        assert_eq!(rank(records.iter(), &[1.0, 0.0], 2).len(), 2);
        assert!(rank(records.iter(), &[1.0, 0.0], 0).is_empty());
    }
}
