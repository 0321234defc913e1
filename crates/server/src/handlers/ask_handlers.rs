//! # Question Answering Handlers

use super::{wrap_response, ApiResponse, AppError, AppState, DebugParams};
use crate::types::{AskRequest, AskResponse, ClearSessionRequest, ClearSessionResponse};
use axum::{
    extract::{Query, State},
    Json,
};
use serde_json::json;
use tracing::info;

/// Answers a question about the current dataset.
///
/// `?debug=true` adds the answering strategy and the current generation.
pub async fn ask_handler(
    State(app_state): State<AppState>,
    debug_params: Query<DebugParams>,
    Json(payload): Json<AskRequest>,
) -> Result<Json<ApiResponse<AskResponse>>, AppError> {
    info!(session_id = ?payload.session_id, "Received question: '{}'", payload.question);
    let executor = &app_state.executor;
    let result = executor
        .ask(&payload.question, payload.session_id.as_deref())
        .await?;

    let debug_info = if debug_params.debug.unwrap_or(false) {
        let generation = executor.info().await.ok().map(|s| s.generation);
        Some(json!({
            "strategy": result.strategy,
            "generation": generation,
            "index_backend": executor.index_backend(),
            "relevant_rows": result.relevant_data.len(),
        }))
    } else {
        None
    };

    Ok(wrap_response(
        AskResponse {
            question: payload.question,
            answer: result.answer,
            relevant_data: result.relevant_data,
            followup_questions: result.followup_questions,
        },
        debug_params,
        debug_info,
    ))
}

/// Drops the conversation memory of a session.
pub async fn clear_session_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<ClearSessionRequest>,
) -> Json<ClearSessionResponse> {
    let success = app_state.executor.clear(&payload.session_id);
    info!(session_id = %payload.session_id, success, "Cleared session memory.");
    Json(ClearSessionResponse { success })
}
