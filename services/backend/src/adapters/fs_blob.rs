//! services/backend/src/adapters/fs_blob.rs
//!
//! `BlobStore` over a directory on the local filesystem. Keys are relative
//! paths; writes go to a temporary sibling first and are renamed into place
//! so readers never observe a half-written file.

use async_trait::async_trait;
use ghost_gym_core::ports::{BlobStore, PortError, PortResult};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rejects absolute keys and `..` so every key stays under `root`.
    fn resolve(&self, key: &str) -> PortResult<PathBuf> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(PortError::Validation(format!("invalid blob key '{}'", key)));
        }
        Ok(self.root.join(relative))
    }
}

fn io_error(e: std::io::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn read(&self, key: &str) -> PortResult<Option<Vec<u8>>> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(e)),
        }
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> PortResult<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, bytes).await.map_err(io_error)?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_error(e));
        }
        debug!(key, bytes = bytes.len(), "Wrote blob");
        Ok(())
    }

    /// Keys under the directory part of `prefix` whose full key starts with
    /// `prefix`, sorted.
    async fn list(&self, prefix: &str) -> PortResult<Vec<String>> {
        let (dir, _) = prefix.rsplit_once('/').unwrap_or(("", prefix));
        let dir_path = if dir.is_empty() {
            self.root.clone()
        } else {
            self.resolve(dir)?
        };
        let mut entries = match tokio::fs::read_dir(&dir_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            if !entry.file_type().await.map_err(io_error)?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.contains(".tmp-") {
                continue;
            }
            let key = if dir.is_empty() {
                name
            } else {
                format!("{}/{}", dir, name)
            };
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
