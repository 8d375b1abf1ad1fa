use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::StatusCode;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::api::response::{
    DeleteResponse, ErrorResponse, ExistsResponse, StatusResponse, UploadResponse,
};
use crate::config::FileServerConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Local file not found: {0}")]
    LocalFileMissing(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server error ({status}): {message}")]
    Server { status: StatusCode, message: String },
}

enum Target {
    /// Re-resolve the effective address from live configuration before
    /// every request, so config changes take effect without
    /// reconstructing the client.
    Config(Arc<FileServerConfig>),
    /// A pinned address, for callers that must reach the specific
    /// server an old record was stored against.
    Fixed { host: String, port: u16 },
}

/// HTTP client for the file service. All access goes over the API,
/// including to a server running in the same process.
pub struct FileServerClient {
    http: reqwest::Client,
    target: Target,
}

impl FileServerClient {
    pub fn new(config: Arc<FileServerConfig>) -> Result<Self, ClientError> {
        Ok(Self {
            http: build_http_client()?,
            target: Target::Config(config),
        })
    }

    pub fn with_address(host: impl Into<String>, port: u16) -> Result<Self, ClientError> {
        Ok(Self {
            http: build_http_client()?,
            target: Target::Fixed {
                host: host.into(),
                port,
            },
        })
    }

    fn base_url(&self) -> String {
        match &self.target {
            Target::Config(config) => config.server_url(),
            Target::Fixed { host, port } => format!("http://{host}:{port}"),
        }
    }

    /// Upload a local file, optionally into `sub_dir` under the
    /// server's root. A missing local file is an error value, never a
    /// panic.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        sub_dir: &str,
    ) -> Result<UploadResponse, ClientError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ClientError::LocalFileMissing(path.to_path_buf())
            } else {
                ClientError::Io(e)
            }
        })?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(data).file_name(file_name),
            )
            .text("sub_dir", sub_dir.to_string());

        let response = self
            .http
            .post(format!("{}/api/files/upload", self.base_url()))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response.json::<UploadResponse>().await?)
    }

    /// Download a stored file, streaming the body to disk chunk by
    /// chunk. With `save_path` the parent directories are created as
    /// needed; without it the file lands in the current directory
    /// under the stored name's basename.
    pub async fn download_file(
        &self,
        remote_path: &str,
        save_path: Option<&Path>,
    ) -> Result<PathBuf, ClientError> {
        let response = self
            .http
            .get(format!(
                "{}/api/files/download/{remote_path}",
                self.base_url()
            ))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let target = match save_path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
                path.to_path_buf()
            }
            None => {
                let name = Path::new(remote_path)
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("download");
                PathBuf::from(name)
            }
        };

        let mut file = tokio::fs::File::create(&target).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(target)
    }

    pub async fn delete_file(&self, remote_path: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(format!(
                "{}/api/files/delete/{remote_path}",
                self.base_url()
            ))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        response.json::<DeleteResponse>().await?;
        Ok(())
    }

    pub async fn file_exists(&self, remote_path: &str) -> Result<bool, ClientError> {
        let response = self
            .http
            .get(format!(
                "{}/api/files/exists/{remote_path}",
                self.base_url()
            ))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let body = response.json::<ExistsResponse>().await?;
        Ok(body.exists)
    }

    pub async fn server_status(&self) -> Result<StatusResponse, ClientError> {
        let response = self
            .http
            .get(format!("{}/api/server/status", self.base_url()))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response.json::<StatusResponse>().await?)
    }
}

fn build_http_client() -> Result<reqwest::Client, ClientError> {
    let client = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()?;
    Ok(client)
}

async fn error_from_response(response: reqwest::Response) -> ClientError {
    let status = response.status();
    let message = match response.json::<ErrorResponse>().await {
        Ok(body) => body.message,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };
    ClientError::Server { status, message }
}
