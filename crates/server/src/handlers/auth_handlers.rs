//! # Login Handler
//!
//! Checks a username and password against the configured credential table.
//! A refused login is a normal `200` response with `success: false`.

use super::AppState;
use crate::types::{LoginRequest, LoginResponse};
use axum::{extract::State, Json};
use tracing::{info, warn};
use uuid::Uuid;

pub async fn login_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Json<LoginResponse> {
    match app_state
        .credentials
        .verify(&payload.username, &payload.password)
        .await
    {
        Ok(role) => {
            let session_id = Uuid::new_v4().to_string();
            info!(username = %payload.username, %role, "Login successful.");
            Json(LoginResponse {
                success: true,
                role: Some(role),
                message: "Login successful".to_string(),
                session_id: Some(session_id),
            })
        }
        Err(failure) => {
            warn!(username = %payload.username, "Login refused: {}", failure.message());
            Json(LoginResponse {
                success: false,
                role: None,
                message: failure.message().to_string(),
                session_id: None,
            })
        }
    }
}
