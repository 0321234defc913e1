use super::{handlers, state::AppState};
use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Creates the Axum router with all the application routes.
pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/login", post(handlers::login_handler))
        .route(
            "/upload-csv",
            post(handlers::upload_csv_handler).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/load-from-url", post(handlers::load_from_url_handler))
        .route("/ask", post(handlers::ask_handler))
        .route("/data/info", get(handlers::data_info_handler))
        .route("/sessions/clear", post(handlers::clear_session_handler))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}
