use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use chrono::Local;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// A file saved under the store root.
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Path relative to the store root, `/`-separated.
    pub relative_path: String,
    /// Sanitized original filename.
    pub file_name: String,
    pub full_path: PathBuf,
}

/// Filesystem storage rooted at a single directory. Stored names carry
/// a timestamp and random token prefix, so concurrent writes never
/// collide on a name.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, std::io::Error> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a caller-supplied relative path under the root.
    /// Absolute paths and `..` components are refused before any
    /// filesystem operation, so a request can never escape the root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, StoreError> {
        if relative.is_empty() {
            return Err(StoreError::InvalidPath(relative.to_string()));
        }

        let mut resolved = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => return Err(StoreError::InvalidPath(relative.to_string())),
            }
        }
        Ok(resolved)
    }

    /// Write `data` under the root, generating a unique stored name.
    /// `sub_dir` is created on first use.
    pub async fn save(
        &self,
        sub_dir: Option<&str>,
        original_name: &str,
        data: Bytes,
    ) -> Result<StoredFile, StoreError> {
        let file_name = sanitize_file_name(original_name);
        let stored_name = format!(
            "{}_{}_{}",
            Local::now().format("%Y%m%d_%H%M%S"),
            random_token(),
            file_name
        );

        let relative_path = match sub_dir.filter(|s| !s.is_empty()) {
            Some(sub) => {
                // Validate the sub-directory the same way as any other
                // relative path before creating it.
                self.resolve(sub)?;
                format!("{}/{}", sub.trim_matches('/'), stored_name)
            }
            None => stored_name,
        };

        let full_path = self.resolve(&relative_path)?;
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full_path, &data).await?;

        Ok(StoredFile {
            relative_path,
            file_name,
            full_path,
        })
    }

    pub async fn read(&self, relative: &str) -> Result<Bytes, StoreError> {
        let path = self.resolve(relative)?;
        if !path.is_file() {
            return Err(StoreError::NotFound(relative.to_string()));
        }
        let data = tokio::fs::read(&path).await?;
        Ok(Bytes::from(data))
    }

    pub async fn exists(&self, relative: &str) -> bool {
        match self.resolve(relative) {
            Ok(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Delete a stored file, then remove its immediate parent
    /// directory when that left it empty. Only one level is pruned and
    /// the root itself is never removed.
    pub async fn delete(&self, relative: &str) -> Result<(), StoreError> {
        let path = self.resolve(relative)?;
        if !path.is_file() {
            return Err(StoreError::NotFound(relative.to_string()));
        }
        tokio::fs::remove_file(&path).await?;

        if let Some(parent) = path.parent() {
            if parent != self.root && is_empty_dir(parent).await {
                if let Err(error) = tokio::fs::remove_dir(parent).await {
                    tracing::debug!(
                        dir = %parent.display(),
                        %error,
                        "could not prune emptied sub-directory"
                    );
                }
            }
        }
        Ok(())
    }

    /// Total bytes stored under the root, walking the whole tree.
    /// Only the rarely-polled status endpoint calls this.
    pub async fn total_size(&self) -> u64 {
        let mut total = 0u64;
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
                continue;
            };
            while let Ok(Some(entry)) = entries.next_entry().await {
                match entry.file_type().await {
                    Ok(kind) if kind.is_dir() => pending.push(entry.path()),
                    Ok(kind) if kind.is_file() => {
                        if let Ok(metadata) = entry.metadata().await {
                            total += metadata.len();
                        }
                    }
                    _ => {}
                }
            }
        }
        total
    }
}

/// Reduce a client-supplied filename to a safe single path component:
/// only the final component is kept, anything outside `[A-Za-z0-9._-]`
/// becomes `_`, and leading/trailing dots are stripped.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Recover the original filename from a stored name by dropping the
/// `date_time_token_` prefix. A name that does not match that shape is
/// returned whole.
pub fn original_name(stored: &str) -> &str {
    let mut parts = stored.splitn(4, '_');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(date), Some(time), Some(token), Some(rest))
            if !date.is_empty() && !time.is_empty() && !token.is_empty() && !rest.is_empty() =>
        {
            rest
        }
        _ => stored,
    }
}

fn random_token() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

async fn is_empty_dir(path: &Path) -> bool {
    match tokio::fs::read_dir(path).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(None)),
        Err(_) => false,
    }
}
