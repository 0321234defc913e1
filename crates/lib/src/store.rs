//! # Dataset Store
//!
//! Holds the single current dataset generation.
//!
//! A replacement parses, encodes and indexes the new dataset off to the side while
//! holding only the replacement lock. Readers keep using the old generation until
//! the new one is published with a single pointer swap, so a query always sees
//! one complete generation.

use crate::{
    encoder::RowEncoder,
    errors::QaError,
    index::{BackendKind, IndexBuilder, RowIndex},
    types::{Dataset, DatasetSummary},
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// A published dataset together with the index built for it.
#[derive(Debug)]
pub struct Generation {
    pub id: u64,
    pub dataset: Arc<Dataset>,
    pub index: Arc<RowIndex>,
    /// Where the data came from: a file name, a URL, or a path.
    pub source: Option<String>,
}

impl Generation {
    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            rows: self.dataset.row_count(),
            columns: self.dataset.column_count(),
            column_names: self.dataset.schema().to_vec(),
            generation: self.id,
            source: self.source.clone(),
            embedded_rows: self.index.embedded_len(),
        }
    }
}

#[derive(Debug)]
pub struct DatasetStore {
    current: RwLock<Option<Arc<Generation>>>,
    /// Serializes replacements; holds the id of the last published generation.
    replace_lock: Mutex<u64>,
    encoder: RowEncoder,
    builder: IndexBuilder,
    backing_file: Option<PathBuf>,
}

impl DatasetStore {
    pub fn new(encoder: RowEncoder, builder: IndexBuilder, backing_file: Option<PathBuf>) -> Self {
        Self {
            current: RwLock::new(None),
            replace_lock: Mutex::new(0),
            encoder,
            builder,
            backing_file,
        }
    }

    pub fn encoder(&self) -> &RowEncoder {
        &self.encoder
    }

    pub fn backend(&self) -> BackendKind {
        self.builder.backend()
    }

    pub fn backing_file(&self) -> Option<&Path> {
        self.backing_file.as_deref()
    }

    /// The current generation, or [`QaError::NoDataLoaded`].
    pub async fn current(&self) -> Result<Arc<Generation>, QaError> {
        self.current
            .read()
            .await
            .as_ref()
            .cloned()
            .ok_or(QaError::NoDataLoaded)
    }

    pub async fn is_loaded(&self) -> bool {
        self.current.read().await.is_some()
    }

    pub async fn info(&self) -> Result<DatasetSummary, QaError> {
        Ok(self.current().await?.summary())
    }

    /// Builds a new generation from `dataset` and publishes it.
    ///
    /// `raw` is the original file content; when absent the dataset is serialized
    /// back to CSV for the backing file. On any error the current generation is
    /// left untouched.
    pub async fn replace(
        &self,
        dataset: Dataset,
        raw: Option<&[u8]>,
        source: Option<String>,
    ) -> Result<DatasetSummary, QaError> {
        let mut last_id = self.replace_lock.lock().await;
        let id = *last_id + 1;
        info!(
            generation = id,
            rows = dataset.row_count(),
            columns = dataset.column_count(),
            "Building new dataset generation."
        );

        let records = self.encoder.encode(&dataset).await?;
        let index = self.builder.build(id, records).await?;

        if let Some(path) = &self.backing_file {
            let bytes = match raw {
                Some(raw) => raw.to_vec(),
                None => to_csv_bytes(&dataset)?,
            };
            write_atomically(path, &bytes).await?;
            debug!("Persisted dataset to {}", path.display());
        }

        let generation = Arc::new(Generation {
            id,
            dataset: Arc::new(dataset),
            index: Arc::new(index),
            source,
        });
        let summary = generation.summary();
        *self.current.write().await = Some(generation);
        *last_id = id;

        info!(generation = id, "Published dataset generation.");
        Ok(summary)
    }
}

/// Writes to a sibling temp file and renames it over `path`.
pub async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), QaError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Serializes a dataset in the loader's layout: a title row, the header, then data.
fn to_csv_bytes(dataset: &Dataset) -> Result<Vec<u8>, QaError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    writer.write_record(["excelqa dataset"])?;
    writer.write_record(dataset.schema())?;
    for row in dataset.rows() {
        writer.write_record(row.iter().map(|cell| {
            if cell.is_null() {
                String::new()
            } else {
                cell.to_string()
            }
        }))?;
    }
    writer
        .into_inner()
        .map_err(|e| QaError::Storage(format!("failed to serialize dataset: {e}")))
}
