//! # Similarity Index
//!
//! One [`RowIndex`] is built per dataset generation. Vector search runs on one of
//! two interchangeable backends:
//!
//! - [`native::NativeVectorIndex`]: a turso table queried with `vector_distance_cos`.
//! - [`brute_force::BruteForceIndex`]: in-memory cosine similarity over every vector.
//!
//! The backend is chosen once by [`IndexBuilder::probe`]. Rows that have no
//! embedding, and queries that have no vector, are matched by keyword.

pub mod brute_force;
pub mod keyword;
pub mod native;

use crate::{errors::QaError, settings::IndexBackendPreference, types::RowRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, sync::Arc};
use tracing::{info, warn};
use turso::Database;

use self::{
    brute_force::BruteForceIndex,
    native::{NativeVectorIndex, RetiredTables},
};

/// Weight applied to keyword scores merged with vector similarities, so a
/// complete keyword match ranks below a near-exact vector match.
pub const MIXED_KEYWORD_WEIGHT: f64 = 0.5;

/// The vector search backend in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Native,
    BruteForce,
}

/// A row id with its similarity to a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredRow {
    pub row_id: usize,
    pub score: f64,
}

/// What to search with.
#[derive(Debug, Clone)]
pub enum IndexQuery {
    /// A query vector plus its source text, used for rows lacking embeddings.
    Embedding { vector: Vec<f32>, text: String },
    /// Plain keyword matching.
    Text(String),
}

/// Sorts by score descending, then row id ascending.
pub fn rank(results: &mut [ScoredRow]) {
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.row_id.cmp(&b.row_id))
    });
}

/// A nearest-neighbour search over the embedded rows of one generation.
#[async_trait]
pub trait VectorBackend: Send + Sync + Debug {
    fn kind(&self) -> BackendKind;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns up to `k` rows ordered by [`rank`].
    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<ScoredRow>, QaError>;
}

/// The searchable index of one dataset generation.
#[derive(Debug)]
pub struct RowIndex {
    generation: u64,
    contents: Vec<String>,
    vectors: Option<Arc<dyn VectorBackend>>,
    dimensions: Option<usize>,
    unembedded: Vec<usize>,
}

impl RowIndex {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of entries; equal to the dataset's row count.
    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Number of entries that carry an embedding.
    pub fn embedded_len(&self) -> usize {
        self.vectors.as_ref().map_or(0, |v| v.len())
    }

    pub fn has_embeddings(&self) -> bool {
        self.embedded_len() > 0
    }

    pub fn backend(&self) -> Option<BackendKind> {
        self.vectors.as_ref().map(|v| v.kind())
    }

    /// Canonical text of a row.
    pub fn content(&self, row_id: usize) -> Option<&str> {
        self.contents.get(row_id).map(String::as_str)
    }

    /// Returns up to `k` rows most similar to `query`.
    ///
    /// In mixed mode, rows without an embedding are scored by keyword and their
    /// scores are scaled by [`MIXED_KEYWORD_WEIGHT`] before merging. Pure keyword
    /// queries keep the unscaled matched/total ratio.
    pub async fn query(&self, query: &IndexQuery, k: usize) -> Result<Vec<ScoredRow>, QaError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut results = match query {
            IndexQuery::Text(text) => self.keyword_over(text, 0..self.contents.len()),
            IndexQuery::Embedding { vector, text } => {
                match (&self.vectors, self.dimensions) {
                    (Some(vectors), Some(dim)) if dim == vector.len() => {
                        let mut hits = vectors.nearest(vector, k).await?;
                        if !self.unembedded.is_empty() {
                            hits.extend(
                                self.keyword_over(text, self.unembedded.iter().copied())
                                    .into_iter()
                                    .map(|hit| ScoredRow {
                                        score: hit.score * MIXED_KEYWORD_WEIGHT,
                                        ..hit
                                    }),
                            );
                        }
                        hits
                    }
                    (Some(_), Some(dim)) => {
                        warn!(
                            "Query vector has {} dimensions but the index has {dim}; using keyword matching",
                            vector.len()
                        );
                        self.keyword_over(text, 0..self.contents.len())
                    }
                    _ => self.keyword_over(text, 0..self.contents.len()),
                }
            }
        };
        rank(&mut results);
        results.truncate(k);
        Ok(results)
    }

    fn keyword_over(&self, text: &str, rows: impl Iterator<Item = usize>) -> Vec<ScoredRow> {
        keyword::keyword_matches(
            text,
            rows.filter_map(|id| self.contents.get(id).map(|c| (id, c.as_str()))),
        )
    }
}

/// Builds [`RowIndex`]es on the backend selected at startup.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    backend: BackendKind,
    db: Option<Database>,
    retired: Arc<RetiredTables>,
}

impl IndexBuilder {
    /// Selects a backend by probing `db` for vector support.
    ///
    /// With no database, or when the probe fails, brute force is used. Selecting
    /// the native backend clears vector tables left by an earlier process.
    pub async fn probe(preference: IndexBackendPreference, db: Option<Database>) -> Self {
        let native_available = match &db {
            Some(db) => native::probe(db).await,
            None => false,
        };

        let backend = match (preference, native_available) {
            (IndexBackendPreference::BruteForce, _) => BackendKind::BruteForce,
            (_, true) => BackendKind::Native,
            (IndexBackendPreference::Native, false) => {
                warn!("Native vector index requested but unavailable; using brute-force search.");
                BackendKind::BruteForce
            }
            (IndexBackendPreference::Auto, false) => BackendKind::BruteForce,
        };
        info!(?backend, "Selected similarity index backend.");

        let db = if backend == BackendKind::Native { db } else { None };
        if let Some(db) = &db {
            native::clear_leftover_tables(db).await;
        }
        Self {
            backend,
            db,
            retired: Arc::default(),
        }
    }

    /// A builder that always uses the in-memory backend.
    pub fn brute_force() -> Self {
        Self {
            backend: BackendKind::BruteForce,
            db: None,
            retired: Arc::default(),
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Native tables released by their last reader and not yet dropped.
    pub fn retired_tables(&self) -> usize {
        self.retired.pending()
    }

    /// Builds the index for `generation` from encoded rows.
    pub async fn build(
        &self,
        generation: u64,
        records: Vec<RowRecord>,
    ) -> Result<RowIndex, QaError> {
        let mut contents = Vec::with_capacity(records.len());
        let mut entries = Vec::new();
        let mut unembedded = Vec::new();

        for (position, record) in records.into_iter().enumerate() {
            debug_assert_eq!(position, record.row_id);
            match record.embedding {
                Some(vector) => entries.push((record.row_id, vector)),
                None => unembedded.push(record.row_id),
            }
            contents.push(record.content);
        }

        let dimensions = entries.first().map(|(_, v)| v.len());
        if let Some(dim) = dimensions {
            if let Some((row_id, v)) = entries.iter().find(|(_, v)| v.len() != dim) {
                return Err(QaError::EmbeddingProvider(format!(
                    "row {row_id} has a {}-dimension vector, expected {dim}",
                    v.len()
                )));
            }
        }

        let vectors: Option<Arc<dyn VectorBackend>> = if entries.is_empty() {
            None
        } else {
            match (&self.backend, &self.db) {
                (BackendKind::Native, Some(db)) => Some(Arc::new(
                    NativeVectorIndex::build(db.clone(), generation, entries, self.retired.clone())
                        .await?,
                )),
                _ => Some(Arc::new(BruteForceIndex::new(entries))),
            }
        };

        info!(
            generation,
            rows = contents.len(),
            embedded = vectors.as_ref().map_or(0, |v| v.len()),
            "Built row index."
        );

        Ok(RowIndex {
            generation,
            contents,
            vectors,
            dimensions,
            unembedded,
        })
    }
}

