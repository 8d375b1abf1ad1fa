use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_ROOT_DIR: &str = "./files";

/// JSON key under which the service settings live in the config file.
const CONFIG_SECTION: &str = "file_server";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Directory {path} is not writable: {source}")]
    Permission {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The persisted `file_server` section of the application config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileServerSettings {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub root_dir: String,
    pub remote_server: bool,
    pub remote_host: String,
    pub remote_port: u16,
}

impl Default for FileServerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            root_dir: DEFAULT_ROOT_DIR.to_string(),
            remote_server: false,
            remote_host: String::new(),
            remote_port: DEFAULT_PORT,
        }
    }
}

/// How callers should reach the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Local,
    Remote,
}

/// The host/port pair in effect for client requests right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub host: String,
    pub port: u16,
    pub mode: AccessMode,
}

/// Where the config file lives, plus the optional backup-directory copy.
/// When a backup copy exists it wins on load, and both locations are
/// rewritten on every save.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub primary: PathBuf,
    pub backup: Option<PathBuf>,
}

impl ConfigPaths {
    pub fn new(primary: impl Into<PathBuf>, backup_dir: Option<&Path>) -> Self {
        let primary = primary.into();
        let backup = backup_dir.map(|dir| {
            let file_name = primary
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "config.json".into());
            dir.join(file_name)
        });
        Self { primary, backup }
    }

    /// Resolve paths from environment variables, falling back to a
    /// config file in the working directory.
    pub fn from_env() -> Self {
        let primary =
            std::env::var("FILEHUB_CONFIG").unwrap_or_else(|_| "./config.json".to_string());
        let backup_dir = std::env::var("FILEHUB_CONFIG_BACKUP_DIR").ok();
        Self::new(primary, backup_dir.as_deref().map(Path::new))
    }

    fn write_targets(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.primary.as_path()).chain(self.backup.as_deref())
    }
}

/// Shared handle over the persisted settings. Setters re-persist
/// immediately; persistence failures are logged and swallowed since a
/// lost write only affects the next process start.
pub struct FileServerConfig {
    paths: ConfigPaths,
    settings: RwLock<FileServerSettings>,
}

impl FileServerConfig {
    /// Load settings from disk. The backup copy takes precedence when
    /// present; a missing or unreadable file yields the defaults.
    pub fn load(paths: ConfigPaths) -> Self {
        let mut settings = read_settings(&paths);
        // The file service is always on; the flag is kept for config
        // file compatibility with older installs.
        settings.enabled = true;
        Self {
            paths,
            settings: RwLock::new(settings),
        }
    }

    pub fn snapshot(&self) -> FileServerSettings {
        self.settings.read().clone()
    }

    pub fn enabled(&self) -> bool {
        self.settings.read().enabled
    }

    pub fn host(&self) -> String {
        self.settings.read().host.clone()
    }

    pub fn port(&self) -> u16 {
        self.settings.read().port
    }

    pub fn root_dir(&self) -> String {
        self.settings.read().root_dir.clone()
    }

    pub fn remote_server(&self) -> bool {
        self.settings.read().remote_server
    }

    pub fn remote_host(&self) -> String {
        self.settings.read().remote_host.clone()
    }

    pub fn remote_port(&self) -> u16 {
        self.settings.read().remote_port
    }

    pub fn set_host(&self, value: impl Into<String>) {
        self.update(|s| s.host = value.into());
    }

    pub fn set_port(&self, value: u16) {
        self.update(|s| s.port = value);
    }

    pub fn set_root_dir(&self, value: impl Into<String>) {
        self.update(|s| s.root_dir = value.into());
    }

    pub fn set_remote_server(&self, value: bool) {
        self.update(|s| s.remote_server = value);
    }

    pub fn set_remote_host(&self, value: impl Into<String>) {
        self.update(|s| s.remote_host = value.into());
    }

    pub fn set_remote_port(&self, value: u16) {
        self.update(|s| s.remote_port = value);
    }

    /// Resolve the address clients should talk to. The mode is always
    /// `Remote`: a same-process local server is still addressed over
    /// HTTP so that every caller goes through the one API code path.
    pub fn effective_config(&self) -> EffectiveConfig {
        let settings = self.settings.read();
        if settings.remote_server && !settings.remote_host.is_empty() {
            EffectiveConfig {
                host: settings.remote_host.clone(),
                port: settings.remote_port,
                mode: AccessMode::Remote,
            }
        } else {
            EffectiveConfig {
                host: settings.host.clone(),
                port: settings.port,
                mode: AccessMode::Remote,
            }
        }
    }

    pub fn server_url(&self) -> String {
        let effective = self.effective_config();
        format!("http://{}:{}", effective.host, effective.port)
    }

    fn update(&self, mutate: impl FnOnce(&mut FileServerSettings)) {
        let snapshot = {
            let mut guard = self.settings.write();
            mutate(&mut guard);
            guard.clone()
        };
        self.persist(&snapshot);
    }

    fn persist(&self, settings: &FileServerSettings) {
        for path in self.paths.write_targets() {
            if let Err(error) = write_section(path, settings) {
                tracing::warn!(
                    path = %path.display(),
                    %error,
                    "failed to persist file server settings"
                );
            }
        }
    }
}

fn read_settings(paths: &ConfigPaths) -> FileServerSettings {
    let source = paths
        .backup
        .as_deref()
        .filter(|p| p.exists())
        .unwrap_or(paths.primary.as_path());

    match read_section(source) {
        Some(settings) => settings,
        None => {
            tracing::debug!(
                path = %source.display(),
                "no usable file server settings, using defaults"
            );
            FileServerSettings::default()
        }
    }
}

fn read_section(path: &Path) -> Option<FileServerSettings> {
    let text = std::fs::read_to_string(path).ok()?;
    let document: serde_json::Value = serde_json::from_str(&text).ok()?;
    let section = document.get(CONFIG_SECTION)?.clone();
    serde_json::from_value(section).ok()
}

/// Read-merge-write: only the `file_server` key is replaced, other
/// top-level keys in the document are left untouched.
fn write_section(path: &Path, settings: &FileServerSettings) -> Result<(), ConfigError> {
    let mut document = std::fs::read_to_string(path)
        .ok()
        .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok())
        .filter(serde_json::Value::is_object)
        .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));

    document[CONFIG_SECTION] = serde_json::to_value(settings)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, serde_json::to_string_pretty(&document)?)?;
    Ok(())
}

/// Confirm a prospective storage root is usable: create it if absent,
/// then write and delete a sentinel file to prove write access.
pub fn check_directory_permission(path: &Path) -> Result<(), ConfigError> {
    let denied = |source| ConfigError::Permission {
        path: path.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(path).map_err(denied)?;

    let sentinel = path.join(".filehub-write-check");
    std::fs::write(&sentinel, b"ok").map_err(denied)?;
    std::fs::remove_file(&sentinel).map_err(denied)?;
    Ok(())
}

/// Maximum accepted upload body, overridable via environment.
pub fn max_upload_size() -> u64 {
    std::env::var("FILEHUB_MAX_UPLOAD_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(50 * 1024 * 1024) // 50MB
}
