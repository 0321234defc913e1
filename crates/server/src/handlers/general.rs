//! # General Route Handlers
//!
//! Root, health check and dataset info.

use super::{AppError, AppState};
use crate::types::{DataInfoResponse, HealthResponse};
use axum::{extract::State, Json};

/// The handler for the root (`/`) endpoint.
pub async fn root() -> &'static str {
    "excelqa server is running."
}

/// The handler for the health check (`/health`) endpoint.
pub async fn health_check(State(app_state): State<AppState>) -> Json<HealthResponse> {
    let executor = &app_state.executor;
    let (data_shape, file_url) = match executor.info().await {
        Ok(summary) => (
            format!("{} rows × {} columns", summary.rows, summary.columns),
            summary.source,
        ),
        Err(_) => ("No data loaded".to_string(), None),
    };
    Json(HealthResponse {
        status: "running".to_string(),
        message: "Excel QA API is running".to_string(),
        data_shape,
        file_url,
        index_backend: executor.index_backend(),
    })
}

/// Shape and column names of the current dataset.
pub async fn data_info_handler(
    State(app_state): State<AppState>,
) -> Result<Json<DataInfoResponse>, AppError> {
    let summary = app_state.executor.info().await?;
    Ok(Json(DataInfoResponse {
        rows: summary.rows,
        columns: summary.columns,
        column_names: summary.column_names,
    }))
}
