//! Avatar and attachment downloads.
//!
//! Every download is skip-if-present: a file already on disk is never
//! requested again. Avatars for a whole collection are fetched concurrently
//! under one deadline and whatever is still pending at the deadline is
//! dropped. Attachments are fetched one at a time per entity. A failed
//! download never stops its siblings.

use crate::api_client::ChatApi;
use crate::error::{SyncError, SyncResult};
use crate::slug::entity_slug;
use crate::store::LocalStore;
use crate::types::{AssetOutcome, AvatarReport, Entity, EntityKind, FileReport};
use crate::watermark::HistoryDocument;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use regex_lite::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

static SIZE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_\d+$").expect("static pattern"));

/// Splits `path` into stem and extension the way a file name would be:
/// the extension starts at the last dot of the final `/` segment, ignoring
/// leading dots.
pub fn split_extension(path: &str) -> (&str, &str) {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    let name = &path[name_start..];
    let leading_dots = name.len() - name.trim_start_matches('.').len();
    match name[leading_dots..].rfind('.') {
        Some(i) => path.split_at(name_start + leading_dots + i),
        None => (path, ""),
    }
}

/// Full-size variant of a photo URL and its extension.
///
/// Thumbnails are named like `photo_125.png`; dropping the `_<digits>`
/// suffix addresses the original upload.
pub fn avatar_source(photo_url: &str) -> (String, String) {
    let (stem, ext) = split_extension(photo_url);
    let stem = SIZE_SUFFIX.replace(stem, "");
    (format!("{stem}{ext}"), ext.to_string())
}

/// Downloads binaries referenced by entities and their history.
#[derive(Clone)]
pub struct AssetFetcher {
    api: Arc<dyn ChatApi>,
    store: LocalStore,
    deadline: Duration,
    concurrency: usize,
}

impl AssetFetcher {
    pub fn new(
        api: Arc<dyn ChatApi>,
        store: LocalStore,
        deadline: Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            api,
            store,
            deadline,
            concurrency: concurrency.max(1),
        }
    }

    /// Fetches `url` into `path` unless `path` already exists.
    pub async fn download_to(&self, url: &str, path: &Path) -> SyncResult<AssetOutcome> {
        if self.store.exists(path).await {
            return Ok(AssetOutcome::AlreadyPresent);
        }
        debug!("{}", path.display());
        let bytes = self.api.download(url).await?;
        self.store.write_file(path, &bytes).await?;
        Ok(AssetOutcome::Downloaded)
    }

    // ── Avatars ──

    /// Saves the entity's full-size photo as `<dir>/<base><ext>`.
    pub async fn download_avatar(
        &self,
        entity: &Entity,
        dir: &Path,
        base: &str,
    ) -> SyncResult<AssetOutcome> {
        let Some(photo_url) = entity.photo_url() else {
            return Ok(AssetOutcome::NoSource);
        };
        let (url, ext) = avatar_source(photo_url);
        self.download_to(&url, &dir.join(format!("{base}{ext}"))).await
    }

    /// Fetches avatars for every user in `users` into `dir` concurrently.
    ///
    /// The batch gets one deadline. Downloads not finished by then are
    /// detached and counted as abandoned; they are not retried.
    pub async fn dump_avatars(&self, users: Vec<Entity>, dir: PathBuf) -> AvatarReport {
        let mut report = AvatarReport::default();
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut pending = FuturesUnordered::new();

        for entity in users {
            if entity.photo_url().is_none() {
                report.skipped += 1;
                continue;
            }
            let fetcher = self.clone();
            let permits = Arc::clone(&permits);
            let dir = dir.clone();
            pending.push(tokio::spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| SyncError::Api(e.to_string()))?;
                let base = entity_slug(EntityKind::Users, &entity);
                fetcher
                    .download_avatar(&entity, &dir, &base)
                    .await
                    .map_err(|e| {
                        warn!("avatar for {} failed: {e}", entity.name);
                        e
                    })
            }));
        }

        let deadline = tokio::time::Instant::now() + self.deadline;
        loop {
            match tokio::time::timeout_at(deadline, pending.next()).await {
                Ok(Some(Ok(Ok(outcome)))) => report.record(outcome),
                Ok(Some(Ok(Err(_)))) => report.failed += 1,
                Ok(Some(Err(join_err))) => {
                    warn!("avatar task aborted: {join_err}");
                    report.failed += 1;
                }
                Ok(None) => break,
                Err(_) => {
                    report.abandoned = pending.len();
                    warn!("abandoning {} avatar downloads at deadline", report.abandoned);
                    break;
                }
            }
        }
        // Dropping the handles detaches the stragglers.
        drop(pending);

        report
    }

    // ── Attachments ──

    /// Saves one attachment as `<dir>/<file_id>_<name>`.
    ///
    /// Presence is checked by the `<file_id>_` prefix because the remote
    /// display name can change between runs.
    pub async fn download_file(&self, file_id: &str, dir: &Path) -> SyncResult<AssetOutcome> {
        if self
            .store
            .has_file_with_prefix(dir, &format!("{file_id}_"))
            .await?
        {
            return Ok(AssetOutcome::AlreadyPresent);
        }

        let info = self.api.resolve_file(file_id).await?;
        let url = info
            .download_url()
            .ok_or_else(|| SyncError::MissingDownloadUrl(file_id.to_string()))?;
        let name = format!("{file_id}_{}", info.base_name());
        self.download_to(url, &dir.join(name)).await
    }

    /// Fetches every attachment referenced by `document`, in order.
    pub async fn download_files(&self, document: &HistoryDocument, dir: &Path) -> FileReport {
        let mut report = FileReport::default();
        for file_id in document.attachment_ids() {
            match self.download_file(&file_id, dir).await {
                Ok(AssetOutcome::Downloaded) => report.downloaded += 1,
                Ok(_) => report.present += 1,
                Err(e) => {
                    warn!("file {file_id} failed: {e}");
                    report.failed += 1;
                }
            }
        }
        report
    }
}
