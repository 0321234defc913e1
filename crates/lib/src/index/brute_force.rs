use super::{rank, BackendKind, ScoredRow, VectorBackend};
use crate::errors::QaError;
use async_trait::async_trait;

/// Cosine similarity between two vectors; `0.0` for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum();
    let magnitude_a = norm(a);
    let magnitude_b = norm(b);

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        0.0
    } else {
        dot_product / (magnitude_a * magnitude_b)
    }
}

fn norm(v: &[f32]) -> f64 {
    v.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt()
}

/// Linear scan over every stored vector.
#[derive(Debug)]
pub struct BruteForceIndex {
    entries: Vec<(usize, Vec<f32>)>,
}

impl BruteForceIndex {
    pub fn new(entries: Vec<(usize, Vec<f32>)>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl VectorBackend for BruteForceIndex {
    fn kind(&self) -> BackendKind {
        BackendKind::BruteForce
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<ScoredRow>, QaError> {
        let mut scored: Vec<ScoredRow> = self
            .entries
            .iter()
            .map(|(row_id, vector)| ScoredRow {
                row_id: *row_id,
                score: cosine_similarity(query, vector),
            })
            .collect();
        rank(&mut scored);
        scored.truncate(k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = [0.3, -1.2, 4.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_handles_zero_and_mismatched_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn nearest_breaks_ties_by_row_id() {
        let index = BruteForceIndex::new(vec![
            (2, vec![1.0, 0.0]),
            (0, vec![1.0, 0.0]),
            (1, vec![0.0, 1.0]),
        ]);
        let hits = index.nearest(&[1.0, 0.0], 3).await.unwrap();
        let ids: Vec<usize> = hits.iter().map(|h| h.row_id).collect();
        assert_eq!(ids, vec![0, 2, 1]);
    }
}
