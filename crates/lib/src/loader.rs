//! # Tabular File Loader
//!
//! Turns CSV bytes, a local path, or a URL into a [`Dataset`].
//!
//! Header convention: the first physical row is discarded and the *second*
//! physical row supplies the column names. Data starts on the third row. Files
//! exported from the spreadsheets this service is fed carry a title row above the
//! real header, so this convention is kept for every load path.

use crate::{
    constants::URL_FETCH_TIMEOUT_SECS,
    errors::QaError,
    types::{CellValue, Dataset},
};
use std::{collections::HashMap, path::Path, time::Duration};
use tracing::{debug, info};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Parses CSV bytes into a dataset.
pub fn parse_csv(bytes: &[u8]) -> Result<Dataset, QaError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(QaError::DataFormat("the file is empty".to_string()));
    }

    // The discarded title row may be narrower or wider than the header, so
    // width is validated by hand against the header row instead of by the reader.
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut records = reader.records();
    let _title_row = records
        .next()
        .transpose()?
        .ok_or_else(|| QaError::DataFormat("the file is empty".to_string()))?;
    let header = records.next().transpose()?.ok_or_else(|| {
        QaError::DataFormat("the file has no header row (expected on line 2)".to_string())
    })?;

    let schema = normalize_headers(header.iter());

    let mut rows = Vec::new();
    for (i, record) in records.enumerate() {
        let record = record?;
        if record.len() != schema.len() {
            return Err(QaError::DataFormat(format!(
                "line {} has {} values but the header has {} columns",
                i + 3,
                record.len(),
                schema.len()
            )));
        }
        rows.push(record.iter().map(CellValue::infer).collect());
    }

    if rows.is_empty() {
        return Err(QaError::DataFormat("the file has no data rows".to_string()));
    }

    let dataset = Dataset::new(schema, rows).map_err(QaError::DataFormat)?;
    debug!(
        "Parsed CSV: {} rows x {} columns",
        dataset.row_count(),
        dataset.column_count()
    );
    Ok(dataset)
}

/// Reads and parses a CSV file from disk.
pub async fn load_path(path: impl AsRef<Path>) -> Result<(Dataset, Vec<u8>), QaError> {
    let path = path.as_ref();
    info!("Loading dataset from file: {}", path.display());
    let bytes = tokio::fs::read(path).await?;
    let dataset = parse_csv(&bytes)?;
    Ok((dataset, bytes))
}

/// Downloads a CSV file over HTTP(S) and parses it.
pub async fn fetch_url(url: &str) -> Result<(Dataset, Vec<u8>), QaError> {
    info!("Downloading dataset from: {url}");
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(URL_FETCH_TIMEOUT_SECS))
        .build()
        .map_err(|e| QaError::Storage(format!("failed to build HTTP client: {e}")))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| QaError::DataFormat(format!("could not download the file: {e}")))?;
    if !response.status().is_success() {
        return Err(QaError::DataFormat(format!(
            "could not download the file: server responded with {}",
            response.status()
        )));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| QaError::DataFormat(format!("could not download the file: {e}")))?
        .to_vec();
    let dataset = parse_csv(&bytes)?;
    Ok((dataset, bytes))
}

/// Cleans header names: blanks become `Unnamed: <i>`, duplicates get `.1`, `.2`, ...
fn normalize_headers<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    raw.enumerate()
        .map(|(i, name)| {
            let name = name.trim();
            let base = if name.is_empty() {
                format!("Unnamed: {i}")
            } else {
                name.to_string()
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let unique = if *count == 0 {
                base
            } else {
                format!("{base}.{count}")
            };
            *count += 1;
            unique
        })
        .collect()
}
