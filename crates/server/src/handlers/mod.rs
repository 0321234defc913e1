//! # API Route Handlers
//!
//! The Axum route handlers for `excelqa-server`, split by concern: service
//! status, login, dataset loading and question answering.

pub mod ask_handlers;
pub mod auth_handlers;
pub mod data_handlers;
pub mod general;

pub use ask_handlers::*;
pub use auth_handlers::*;
pub use data_handlers::*;
pub use general::*;

use super::{
    errors::AppError,
    state::AppState,
    types::{ApiResponse, DebugParams},
};
use axum::{extract::Query, Json};
use serde_json::Value;

/// Wraps a successful result in the standard `ApiResponse` format, including
/// debug information only when `?debug=true` was requested.
pub(crate) fn wrap_response<T>(
    result: T,
    debug_params: Query<DebugParams>,
    debug_info: Option<Value>,
) -> Json<ApiResponse<T>> {
    let debug = if debug_params.debug.unwrap_or(false) {
        debug_info
    } else {
        None
    };
    Json(ApiResponse { debug, result })
}
