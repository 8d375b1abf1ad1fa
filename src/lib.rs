//! filehub - embedded HTTP file storage for desktop application attachments
//!
//! This crate provides the file service a desktop application embeds to
//! store record attachments:
//! - An HTTP API (upload, download, delete, existence check, status)
//!   over a single storage root on local disk
//! - A lifecycle manager that runs the server in-process, or defers to
//!   an externally managed remote server
//! - An HTTP client used for all access; local servers are addressed
//!   over the API too, never through the filesystem
//! - JSON-file configuration with a backup-directory copy

pub mod api;
pub mod client;
pub mod config;
pub mod manager;
pub mod store;

use std::sync::Arc;

use store::FileStore;

/// Shared application state
pub struct AppState {
    pub store: Arc<FileStore>,
    pub max_upload_size: u64,
}
