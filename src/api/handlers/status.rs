use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::api::response::StatusResponse;
use crate::AppState;

pub async fn server_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        root_dir: state.store.root().display().to_string(),
        total_space: state.store.total_size().await,
    })
}
