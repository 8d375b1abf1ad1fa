use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use tokio_util::io::ReaderStream;

use crate::api::response::{ApiError, DeleteResponse, ExistsResponse, UploadResponse};
use crate::store::{original_name, StoreError};
use crate::AppState;

/// Accept a multipart upload (`file` part required, `sub_dir` text
/// field optional) and store it under the root with a generated name.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut file_data: Option<Bytes> = None;
    let mut file_name: Option<String> = None;
    let mut sub_dir = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart data: {e}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?;
                file_data = Some(data);
            }
            "sub_dir" => {
                sub_dir = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid sub_dir: {e}")))?;
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let data = file_data.ok_or_else(|| ApiError::bad_request("file part is required"))?;
    let original = file_name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::bad_request("no file selected"))?;

    let sub_dir = (!sub_dir.is_empty()).then_some(sub_dir.as_str());
    let stored = state
        .store
        .save(sub_dir, &original, data)
        .await
        .map_err(store_error)?;

    tracing::debug!(path = %stored.relative_path, "Stored uploaded file");

    Ok(Json(UploadResponse {
        success: true,
        file_path: stored.relative_path,
        file_name: stored.file_name,
        full_path: stored.full_path.display().to_string(),
    }))
}

/// Stream a stored file back as an attachment. The download filename
/// is the original name recovered from the stored name's prefix.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(file_path): Path<String>,
) -> Result<Response, ApiError> {
    let full_path = state
        .store
        .resolve(&file_path)
        .map_err(|_| ApiError::not_found("File not found"))?;

    let file = match tokio::fs::File::open(&full_path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("File not found"));
        }
        Err(e) => return Err(ApiError::internal(format!("Failed to open file: {e}"))),
    };

    let metadata = file
        .metadata()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to read file metadata: {e}")))?;
    if metadata.is_dir() {
        return Err(ApiError::not_found("File not found"));
    }

    let stored_name = full_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(&file_path)
        .to_string();
    let download_name = original_name(&stored_name);
    let mime_type = mime_guess::from_path(download_name).first_or_octet_stream();

    let body = Body::from_stream(ReaderStream::new(file));
    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        mime_type
            .as_ref()
            .parse()
            .unwrap_or(header::HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, header::HeaderValue::from(metadata.len()));
    if let Ok(value) = format!("attachment; filename=\"{download_name}\"").parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(file_path): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.store.delete(&file_path).await.map_err(store_error)?;

    tracing::debug!(path = %file_path, "Deleted stored file");

    Ok(Json(DeleteResponse {
        success: true,
        message: "file deleted".to_string(),
    }))
}

/// Existence is an answer, not an error: a missing or malformed path
/// reports `exists: false`.
pub async fn file_exists(
    State(state): State<Arc<AppState>>,
    Path(file_path): Path<String>,
) -> Json<ExistsResponse> {
    Json(ExistsResponse {
        exists: state.store.exists(&file_path).await,
    })
}

fn store_error(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound(_) => ApiError::not_found("File not found"),
        StoreError::InvalidPath(path) => ApiError::bad_request(format!("Invalid path: {path}")),
        StoreError::Io(e) => ApiError::internal(e.to_string()),
    }
}
