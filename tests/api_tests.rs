use std::net::SocketAddr;
use std::sync::Arc;

use filehub::config::{ConfigPaths, FileServerConfig};
use filehub::manager::{FileServerManager, StartOutcome};

fn test_config(dir: &tempfile::TempDir) -> Arc<FileServerConfig> {
    let paths = ConfigPaths::new(dir.path().join("config.json"), None);
    let config = Arc::new(FileServerConfig::load(paths));
    config.set_host("127.0.0.1");
    config.set_port(0);
    config.set_root_dir(dir.path().join("files").to_string_lossy().to_string());
    config
}

async fn spawn_server(dir: &tempfile::TempDir) -> (FileServerManager, SocketAddr) {
    let manager = FileServerManager::new(test_config(dir));
    let outcome = manager.start().await.unwrap();
    let StartOutcome::Started(addr) = outcome else {
        panic!("expected a locally started server, got {outcome:?}");
    };
    (manager, addr)
}

fn api_url(addr: SocketAddr, path: &str) -> String {
    format!("http://{addr}{path}")
}

async fn upload(
    addr: SocketAddr,
    file_name: &str,
    content: &'static [u8],
    sub_dir: &str,
) -> serde_json::Value {
    let form = reqwest::multipart::Form::new()
        .part(
            "file",
            reqwest::multipart::Part::bytes(content).file_name(file_name.to_string()),
        )
        .text("sub_dir", sub_dir.to_string());

    reqwest::Client::new()
        .post(api_url(addr, "/api/files/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_upload_returns_stored_path() {
    let dir = tempfile::tempdir().unwrap();
    let (_manager, addr) = spawn_server(&dir).await;

    let body = upload(addr, "hello.txt", b"hello world", "").await;

    assert_eq!(body["success"], true);
    assert_eq!(body["file_name"], "hello.txt");
    let file_path = body["file_path"].as_str().unwrap();
    assert!(file_path.ends_with("_hello.txt"));
    assert!(!file_path.contains('/'));
}

#[tokio::test]
async fn test_upload_into_sub_dir() {
    let dir = tempfile::tempdir().unwrap();
    let (_manager, addr) = spawn_server(&dir).await;

    let body = upload(addr, "doc.txt", b"data", "17").await;

    assert_eq!(body["success"], true);
    assert!(body["file_path"].as_str().unwrap().starts_with("17/"));
}

#[tokio::test]
async fn test_upload_without_file_part_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (_manager, addr) = spawn_server(&dir).await;

    let form = reqwest::multipart::Form::new().text("sub_dir", "x".to_string());
    let response = reqwest::Client::new()
        .post(api_url(addr, "/api/files/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("file part"));
}

#[tokio::test]
async fn test_download_reconstructs_original_filename() {
    let dir = tempfile::tempdir().unwrap();
    let (_manager, addr) = spawn_server(&dir).await;

    let body = upload(addr, "report.pdf", b"pdf bytes", "").await;
    let file_path = body["file_path"].as_str().unwrap();

    let response = reqwest::Client::new()
        .get(api_url(addr, &format!("/api/files/download/{file_path}")))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let disposition = response
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(disposition, "attachment; filename=\"report.pdf\"");
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(content_type, "application/pdf");
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"pdf bytes");
}

#[tokio::test]
async fn test_download_missing_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let (_manager, addr) = spawn_server(&dir).await;

    let response = reqwest::Client::new()
        .get(api_url(addr, "/api/files/download/absent.txt"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_delete_then_delete_again() {
    let dir = tempfile::tempdir().unwrap();
    let (_manager, addr) = spawn_server(&dir).await;

    let body = upload(addr, "gone.txt", b"bye", "grp").await;
    let file_path = body["file_path"].as_str().unwrap().to_string();
    let client = reqwest::Client::new();

    let response = client
        .delete(api_url(addr, &format!("/api/files/delete/{file_path}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);

    // Second delete of the same path reports not-found, not a crash
    let response = client
        .delete(api_url(addr, &format!("/api/files/delete/{file_path}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_exists_endpoint_never_errors() {
    let dir = tempfile::tempdir().unwrap();
    let (_manager, addr) = spawn_server(&dir).await;
    let client = reqwest::Client::new();

    let response = client
        .get(api_url(addr, "/api/files/exists/nothing.txt"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["exists"], false);

    let uploaded = upload(addr, "there.txt", b"x", "").await;
    let file_path = uploaded["file_path"].as_str().unwrap();

    let response = client
        .get(api_url(addr, &format!("/api/files/exists/{file_path}")))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["exists"], true);
}

#[tokio::test]
async fn test_status_endpoint_reports_usage() {
    let dir = tempfile::tempdir().unwrap();
    let (_manager, addr) = spawn_server(&dir).await;

    upload(addr, "counted.txt", b"12345678", "").await;

    let body: serde_json::Value = reqwest::Client::new()
        .get(api_url(addr, "/api/server/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "running");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["root_dir"].as_str().unwrap().contains("files"));
    assert_eq!(body["total_space"], 8);
}
