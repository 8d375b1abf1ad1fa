use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api;
use crate::client::FileServerClient;
use crate::config::{self, AccessMode, FileServerConfig};
use crate::store::FileStore;
use crate::AppState;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Storage root unavailable: {0}")]
    Storage(#[from] std::io::Error),
    #[error("Server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("Server error: {0}")]
    Serve(std::io::Error),
    #[error("Server did not stop within {}s", SHUTDOWN_TIMEOUT.as_secs())]
    ShutdownTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Remote mode is configured; nothing was started locally.
    Remote,
    AlreadyRunning,
    Started(SocketAddr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Stopped,
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerStatusReport {
    pub mode: AccessMode,
    pub status: RunStatus,
    pub host: String,
    pub port: u16,
    pub root_dir: String,
    pub enabled: bool,
}

struct RunningServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<Result<(), std::io::Error>>,
}

enum RunState {
    Stopped,
    Running(RunningServer),
}

/// Owns the lifecycle of the in-process file server. Constructed once
/// by the application's composition root and handed to whoever needs
/// start/stop/status.
pub struct FileServerManager {
    config: Arc<FileServerConfig>,
    state: Mutex<RunState>,
}

impl FileServerManager {
    pub fn new(config: Arc<FileServerConfig>) -> Self {
        Self {
            config,
            state: Mutex::new(RunState::Stopped),
        }
    }

    fn remote_configured(&self) -> bool {
        self.config.remote_server() && !self.config.remote_host().is_empty()
    }

    /// Start the local server unless remote mode is configured.
    /// Idempotent: a second call while running reports success.
    ///
    /// The listener is bound before the serve task spawns, so a
    /// successful return means the server is accepting connections.
    /// Binding port 0 yields a usable ephemeral port via the returned
    /// address.
    pub async fn start(&self) -> Result<StartOutcome, ManagerError> {
        let mut state = self.state.lock().await;

        if self.remote_configured() {
            info!(
                host = %self.config.remote_host(),
                port = self.config.remote_port(),
                "using remote file server"
            );
            return Ok(StartOutcome::Remote);
        }

        if let RunState::Running(server) = &*state {
            info!(addr = %server.addr, "file server already running");
            return Ok(StartOutcome::AlreadyRunning);
        }

        let store = Arc::new(FileStore::new(self.config.root_dir())?);
        let app_state = Arc::new(AppState {
            store,
            max_upload_size: config::max_upload_size(),
        });
        let router = api::create_router(app_state);

        let bind_addr = format!("{}:{}", self.config.host(), self.config.port());
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .map_err(|source| ManagerError::Bind {
                addr: bind_addr.clone(),
                source,
            })?;
        let addr = listener.local_addr().map_err(ManagerError::Serve)?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!(%addr, root_dir = %self.config.root_dir(), "file server listening");
        *state = RunState::Running(RunningServer {
            addr,
            shutdown: shutdown_tx,
            task,
        });
        Ok(StartOutcome::Started(addr))
    }

    /// Stop the local server, waiting for in-flight requests to drain.
    /// Stopping an already-stopped server is a no-op.
    pub async fn stop(&self) -> Result<(), ManagerError> {
        let mut state = self.state.lock().await;

        let RunState::Running(server) = std::mem::replace(&mut *state, RunState::Stopped) else {
            return Ok(());
        };

        let _ = server.shutdown.send(());
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, server.task).await {
            Ok(join_result) => match join_result? {
                Ok(()) => {
                    info!("file server stopped");
                    Ok(())
                }
                Err(e) => Err(ManagerError::Serve(e)),
            },
            Err(_) => {
                warn!("file server did not stop before the shutdown deadline");
                Err(ManagerError::ShutdownTimeout)
            }
        }
    }

    pub async fn is_running(&self) -> bool {
        matches!(&*self.state.lock().await, RunState::Running(_))
    }

    /// The bound address of the running local server, if any.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.state.lock().await {
            RunState::Running(server) => Some(server.addr),
            RunState::Stopped => None,
        }
    }

    /// Report the service's current mode and reachability: a remote
    /// server is probed over HTTP, a local one is read from run state.
    pub async fn status(&self) -> ServerStatusReport {
        let effective = self.config.effective_config();

        let (mode, status) = if self.remote_configured() {
            let reachable = match FileServerClient::new(Arc::clone(&self.config)) {
                Ok(client) => client.server_status().await.is_ok(),
                Err(_) => false,
            };
            let status = if reachable {
                RunStatus::Connected
            } else {
                RunStatus::Disconnected
            };
            (AccessMode::Remote, status)
        } else {
            let status = if self.is_running().await {
                RunStatus::Running
            } else {
                RunStatus::Stopped
            };
            (AccessMode::Local, status)
        };

        ServerStatusReport {
            mode,
            status,
            host: effective.host,
            port: effective.port,
            root_dir: self.config.root_dir(),
            enabled: self.config.enabled(),
        }
    }
}
