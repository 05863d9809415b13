//! Local directory tree holding the mirror.
//!
//! Layout under the root:
//! - `rooms.json`, `users.json`: collection snapshots
//! - `{rooms|users}/<slug>/<slug>.json`: history document, most recent first
//! - `{rooms|users}/<slug>/files/<fileId>_<name>`: attachments
//! - `{rooms|users}/<slug>/<slug>.<ext>`: the entity's own avatar
//! - `avatars/<slug>.<ext>`: user avatars from a full avatar dump
//!
//! Unreadable JSON is reported as absent; callers refetch instead of failing.

use crate::error::SyncResult;
use crate::types::{Entity, EntityKind};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Clone, Debug)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ── Layout ──

    pub fn collection_path(&self, kind: EntityKind) -> PathBuf {
        self.root.join(format!("{}.json", kind.as_str()))
    }

    pub fn entity_dir(&self, kind: EntityKind, slug: &str) -> PathBuf {
        self.root.join(kind.as_str()).join(slug)
    }

    pub fn history_path(&self, kind: EntityKind, slug: &str) -> PathBuf {
        self.entity_dir(kind, slug).join(format!("{slug}.json"))
    }

    pub fn files_dir(&self, kind: EntityKind, slug: &str) -> PathBuf {
        self.entity_dir(kind, slug).join("files")
    }

    pub fn avatars_dir(&self) -> PathBuf {
        self.root.join("avatars")
    }

    // ── Collection snapshots ──

    /// Cached listing for `kind`, or `None` when it must be fetched.
    pub async fn load_collection(&self, kind: EntityKind) -> Option<Vec<Entity>> {
        read_json(&self.collection_path(kind)).await
    }

    pub async fn save_collection(&self, kind: EntityKind, entities: &[Entity]) -> SyncResult<()> {
        write_json(&self.collection_path(kind), entities).await
    }

    // ── Files ──

    pub async fn ensure_dir(&self, dir: &Path) -> SyncResult<()> {
        tokio::fs::create_dir_all(dir).await?;
        Ok(())
    }

    pub async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    /// True when any file in `dir` starts with `prefix`. A missing directory
    /// has no files.
    pub async fn has_file_with_prefix(&self, dir: &Path, prefix: &str) -> SyncResult<bool> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with(prefix) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Writes `bytes` to `path`, creating parent directories.
    pub async fn write_file(&self, path: &Path, bytes: &[u8]) -> SyncResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await?;
        debug!("wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

/// Reads and parses a JSON document. Missing and malformed files both
/// yield `None`.
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("ignoring unreadable {}: {e}", path.display());
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("ignoring malformed {}: {e}", path.display());
            None
        }
    }
}

/// Serializes `value` and overwrites `path` with it.
pub(crate) async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> SyncResult<()> {
    let bytes = serde_json::to_vec(value)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}
