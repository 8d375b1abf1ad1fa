use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.max_upload_size as usize;

    Router::new()
        .route(
            "/api/files/upload",
            post(handlers::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/files/download/*file_path", get(handlers::download_file))
        .route("/api/files/delete/*file_path", delete(handlers::delete_file))
        .route("/api/files/exists/*file_path", get(handlers::file_exists))
        .route("/api/server/status", get(handlers::server_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
