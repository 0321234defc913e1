//! # Dataset Loading Handlers
//!
//! `/upload-csv` takes a multipart `file` field, saves it under the uploads
//! directory and publishes it as the current dataset. `/load-from-url` downloads
//! a CSV and publishes it. A failed load leaves the previous dataset in place.

use super::{AppError, AppState};
use crate::types::{LoadFromUrlRequest, LoadResponse, UploadResponse};
use axum::{extract::State, Json};
use axum_extra::extract::Multipart;
use excelqa::store::write_atomically;
use std::path::{Path, PathBuf};
use tracing::info;

/// Keeps only the final path component so uploads cannot escape the uploads directory.
fn sanitize_file_name(raw: &str) -> Option<String> {
    Path::new(raw)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
}

pub async fn upload_csv_handler(
    State(app_state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(anyhow::Error::from)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .and_then(sanitize_file_name)
            .ok_or_else(|| AppError::BadRequest("The uploaded file has no name.".to_string()))?;
        let bytes = field.bytes().await.map_err(anyhow::Error::from)?.to_vec();
        upload = Some((file_name, bytes));
    }

    let (file_name, bytes) = upload.ok_or_else(|| {
        AppError::BadRequest("Missing multipart field 'file'.".to_string())
    })?;
    if !file_name.to_ascii_lowercase().ends_with(".csv") {
        return Err(AppError::BadRequest(
            "Only CSV files are allowed".to_string(),
        ));
    }

    let config = &app_state.config;
    let local_path = PathBuf::from(&config.uploads_dir).join(&file_name);
    write_atomically(&local_path, &bytes).await?;
    let file_url = format!(
        "{}/uploads/{file_name}",
        config.server_url.trim_end_matches('/')
    );

    let summary = app_state
        .executor
        .load_bytes(&bytes, Some(file_url.clone()))
        .await?;
    info!(
        "Uploaded and loaded '{file_name}': {} rows x {} columns",
        summary.rows, summary.columns
    );

    Ok(Json(UploadResponse {
        success: true,
        message: "CSV uploaded successfully".to_string(),
        file_url,
        local_path: local_path.display().to_string(),
        rows: summary.rows,
        columns: summary.columns,
    }))
}

pub async fn load_from_url_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<LoadFromUrlRequest>,
) -> Result<Json<LoadResponse>, AppError> {
    let url = payload.file_url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(AppError::BadRequest(
            "file_url must be an http or https URL.".to_string(),
        ));
    }

    let summary = app_state.executor.load_url(url).await?;
    info!(
        "Loaded data from {url}: {} rows x {} columns",
        summary.rows, summary.columns
    );

    Ok(Json(LoadResponse {
        success: true,
        message: "Data loaded from URL successfully".to_string(),
        rows: summary.rows,
        columns: summary.columns,
    }))
}

#[cfg(test)]
mod tests {
    use super::sanitize_file_name;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("sales.csv").as_deref(), Some("sales.csv"));
        assert_eq!(
            sanitize_file_name("../../etc/passwd.csv").as_deref(),
            Some("passwd.csv")
        );
        assert_eq!(sanitize_file_name(".."), None);
        assert_eq!(sanitize_file_name(""), None);
    }
}
