//! # Row Encoder
//!
//! Converts dataset rows into [`RowRecord`]s: a canonical text rendering and,
//! when an embedding provider is configured, a vector per row.

use crate::{
    errors::QaError,
    providers::ai::EmbeddingProvider,
    types::{CellValue, Dataset, RowRecord},
};
use futures::{stream, StreamExt};
use tracing::{info, warn};

/// Renders a row as `column: value, column: value, ...` in schema order.
pub fn render_row(schema: &[String], row: &[CellValue]) -> String {
    schema
        .iter()
        .zip(row)
        .map(|(column, value)| format!("{column}: {value}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Lists columns with the type of their first non-null value.
pub fn describe_schema(dataset: &Dataset) -> String {
    dataset
        .schema()
        .iter()
        .enumerate()
        .map(|(c, name)| {
            let kind = dataset
                .rows()
                .iter()
                .map(|row| &row[c])
                .find(|v| !v.is_null())
                .map_or("empty", |v| match v {
                    CellValue::Integer(_) => "integer",
                    CellValue::Float(_) => "float",
                    CellValue::Text(_) => "text",
                    CellValue::Null => "empty",
                });
            format!("- {name} ({kind})")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Batch encoder for a dataset generation.
#[derive(Debug, Clone)]
pub struct RowEncoder {
    embedder: Option<Box<dyn EmbeddingProvider>>,
    concurrency: usize,
}

impl RowEncoder {
    pub fn new(embedder: Option<Box<dyn EmbeddingProvider>>, concurrency: usize) -> Self {
        Self {
            embedder,
            concurrency: concurrency.max(1),
        }
    }

    /// An encoder that only renders text.
    pub fn text_only() -> Self {
        Self::new(None, 1)
    }

    pub fn embeddings_enabled(&self) -> bool {
        self.embedder.is_some()
    }

    /// Encodes every row of `dataset`.
    ///
    /// A row whose embedding call fails keeps `embedding: None` and is matched by
    /// keyword at query time. If no row at all can be embedded the pass fails with
    /// [`QaError::EmbeddingProvider`].
    pub async fn encode(&self, dataset: &Dataset) -> Result<Vec<RowRecord>, QaError> {
        let texts: Vec<String> = dataset
            .rows()
            .iter()
            .map(|row| render_row(dataset.schema(), row))
            .collect();

        let Some(embedder) = &self.embedder else {
            return Ok(texts
                .into_iter()
                .enumerate()
                .map(|(row_id, content)| RowRecord {
                    row_id,
                    content,
                    embedding: None,
                })
                .collect());
        };

        info!(
            "Embedding {} rows with concurrency {}",
            texts.len(),
            self.concurrency
        );
        let pending: Vec<_> = texts.iter().map(|text| embedder.embed(text)).collect();
        let results: Vec<_> = stream::iter(pending)
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut expected_dim = embedder.dimensions();
        let mut failures = 0usize;
        let mut last_error = String::new();
        let mut records = Vec::with_capacity(texts.len());

        for (row_id, (content, result)) in texts.into_iter().zip(results).enumerate() {
            let embedding = match result {
                Ok(vector) if vector.is_empty() => {
                    last_error = "provider returned an empty vector".to_string();
                    None
                }
                Ok(vector) => match expected_dim {
                    Some(dim) if dim != vector.len() => {
                        last_error = format!(
                            "vector has {} dimensions, expected {dim}",
                            vector.len()
                        );
                        None
                    }
                    _ => {
                        expected_dim = Some(vector.len());
                        Some(vector)
                    }
                },
                Err(e) => {
                    last_error = e.to_string();
                    None
                }
            };
            if embedding.is_none() {
                failures += 1;
                warn!("Row {row_id} was not embedded; it will be matched by keyword: {last_error}");
            }
            records.push(RowRecord {
                row_id,
                content,
                embedding,
            });
        }

        if !records.is_empty() && failures == records.len() {
            return Err(QaError::EmbeddingProvider(format!(
                "all {failures} rows failed to embed (last error: {last_error})"
            )));
        }

        info!(
            "Encoded {} rows ({} without embeddings)",
            records.len(),
            failures
        );
        Ok(records)
    }

    /// Embeds a question. Returns `None` when embeddings are disabled or the call fails.
    pub async fn embed_query(&self, text: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        match embedder.embed(text).await {
            Ok(vector) if !vector.is_empty() => Some(vector),
            Ok(_) => None,
            Err(e) => {
                warn!("Question embedding failed, falling back to keyword matching: {e}");
                None
            }
        }
    }
}
