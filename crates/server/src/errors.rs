use excelqa::QaError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// A custom error type for the server application.
///
/// This enum encapsulates different kinds of errors that can occur within the server,
/// allowing them to be converted into appropriate HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Errors originating from the `excelqa` core.
    Qa(QaError),
    /// The request itself was unacceptable.
    BadRequest(String),
    /// Generic internal server errors.
    Internal(anyhow::Error),
}

impl From<QaError> for AppError {
    fn from(err: QaError) -> Self {
        AppError::Qa(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl AppError {
    /// The HTTP status and the message returned to the client.
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Qa(err) => match err {
                QaError::DataFormat(_) | QaError::InvalidQuestion => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                QaError::NoDataLoaded => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
                QaError::EmbeddingProvider(_) => (
                    StatusCode::BAD_GATEWAY,
                    "The embedding provider is unavailable. Try again later.".to_string(),
                ),
                QaError::Generation(_) => (
                    StatusCode::BAD_GATEWAY,
                    "The language model failed to generate an answer. Try again later."
                        .to_string(),
                ),
                QaError::AgentTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, err.to_string()),
                QaError::Storage(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A storage operation failed.".to_string(),
                ),
            },
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal server error occurred.".to_string(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status_code, error_message) = self.status_and_message();
        match &self {
            AppError::Qa(err) => error!("QaError: {:?}", err),
            AppError::BadRequest(message) => error!("Bad request: {message}"),
            AppError::Internal(err) => error!("Internal server error: {:?}", err),
        }

        let body = Json(json!({
            "error": error_message,
        }));

        (status_code, body).into_response()
    }
}
