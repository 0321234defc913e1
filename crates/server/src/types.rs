//! Request and response bodies of the HTTP API.

use excelqa::{index::BackendKind, RelevantRow};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize, Default)]
pub struct DebugParams {
    pub debug: Option<bool>,
}

#[derive(Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<Value>,
    pub result: T,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    /// `"<rows> rows × <columns> columns"`, or `"No data loaded"`.
    pub data_shape: String,
    pub file_url: Option<String>,
    pub index_backend: BackendKind,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub file_url: String,
    pub local_path: String,
    pub rows: usize,
    pub columns: usize,
}

#[derive(Debug, Deserialize)]
pub struct LoadFromUrlRequest {
    pub file_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoadResponse {
    pub success: bool,
    pub message: String,
    pub rows: usize,
    pub columns: usize,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub question: String,
    pub answer: String,
    pub relevant_data: Vec<RelevantRow>,
    pub followup_questions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DataInfoResponse {
    pub rows: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClearSessionRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearSessionResponse {
    pub success: bool,
}
