//! Mirror orchestrator.
//!
//! Drives one run over the requested targets:
//! - Avatar dump for all users (concurrent, deadline-bounded)
//! - History sync per entity, strictly one entity at a time
//! - Attachment and avatar download for each synced entity
//!
//! A failing entity is logged and recorded; the run moves on to the next.

use crate::api_client::ChatApi;
use crate::assets::AssetFetcher;
use crate::config::{MirrorConfig, SyncTargets};
use crate::error::SyncResult;
use crate::history::{HistoryFetcher, PageSizer, merge_and_persist};
use crate::slug::entity_slug;
use crate::store::LocalStore;
use crate::types::*;
use crate::watermark::HistoryDocument;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The history mirror: one API client, one local store.
pub struct Mirror {
    api: Arc<dyn ChatApi>,
    store: LocalStore,
    assets: AssetFetcher,
    sizer: PageSizer,
}

impl Mirror {
    pub fn new(api: Arc<dyn ChatApi>, config: &MirrorConfig) -> Self {
        let store = LocalStore::new(config.output_dir.clone());
        let assets = AssetFetcher::new(
            Arc::clone(&api),
            store.clone(),
            config.avatar_deadline(),
            config.avatar_concurrency,
        );
        Self {
            api,
            store,
            assets,
            sizer: PageSizer::from_config(config),
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Runs every requested target: avatars, then users, then rooms.
    ///
    /// Only invalid targets or an unusable output directory fail the run.
    /// A target whose collection cannot be listed is recorded in the
    /// summary and the remaining targets still run.
    pub async fn run(&self, targets: SyncTargets) -> SyncResult<RunSummary> {
        targets.validate()?;
        self.store.ensure_dir(self.store.root()).await?;

        let mut summary = RunSummary::default();
        if targets.avatars {
            match self.dump_avatars().await {
                Ok(report) => summary.avatars = Some(report),
                Err(e) => {
                    error!("avatar dump failed: {e}");
                    summary.record_target_failure("avatars", &e);
                }
            }
        }

        for kind in [EntityKind::Users, EntityKind::Rooms] {
            if !targets.includes(kind) {
                continue;
            }
            match self.sync_collection(kind, targets.files).await {
                Ok(report) => summary.collections.push(report),
                Err(e) => {
                    error!("{kind} sync failed: {e}");
                    summary.record_target_failure(kind.as_str(), &e);
                }
            }
        }

        info!("Done!");
        Ok(summary)
    }

    /// The cached collection snapshot, or a fresh listing which then
    /// becomes the snapshot.
    pub async fn entities(&self, kind: EntityKind) -> SyncResult<Vec<Entity>> {
        if let Some(cached) = self.store.load_collection(kind).await {
            debug!("using cached {kind} ({} entries)", cached.len());
            return Ok(cached);
        }

        let entities = self.api.list_entities(kind).await?;
        self.store.save_collection(kind, &entities).await?;
        info!("listed {} {kind}", entities.len());
        Ok(entities)
    }

    /// Saves every user's avatar under `avatars/`.
    pub async fn dump_avatars(&self) -> SyncResult<AvatarReport> {
        let users = self.entities(EntityKind::Users).await?;
        let report = self.assets.dump_avatars(users, self.store.avatars_dir()).await;
        info!(
            "avatars: {} downloaded, {} present, {} failed, {} abandoned",
            report.downloaded, report.present, report.failed, report.abandoned
        );
        Ok(report)
    }

    /// Syncs history for every entity of `kind`, one after another.
    pub async fn sync_collection(
        &self,
        kind: EntityKind,
        files_too: bool,
    ) -> SyncResult<CollectionReport> {
        let entities = self.entities(kind).await?;
        let mut report = CollectionReport::new(kind);

        for entity in &entities {
            match self.sync_entity(kind, entity, files_too).await {
                Ok(outcome) => report.synced.push(outcome),
                Err(e) => {
                    error!("sync of {kind} {} failed: {e}", entity.name);
                    report.failed.push(EntityFailure {
                        name: entity.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "{kind}: {} synced ({} new items), {} failed",
            report.synced.len(),
            report.new_items(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Brings one entity's cached history up to date, then fetches its
    /// attachments and avatar when `files_too` is set.
    ///
    /// Nothing is written unless the whole walk succeeds.
    pub async fn sync_entity(
        &self,
        kind: EntityKind,
        entity: &Entity,
        files_too: bool,
    ) -> SyncResult<EntityOutcome> {
        let slug = entity_slug(kind, entity);
        let history_path = self.store.history_path(kind, &slug);

        let cached = HistoryDocument::load(&history_path).await;
        let watermark = cached.watermark().map(str::to_string);

        let fresh = HistoryFetcher::new(self.api.as_ref(), kind, entity, watermark, self.sizer)
            .collect()
            .await?;
        let merged = merge_and_persist(&history_path, cached, fresh).await?;

        let mut outcome = EntityOutcome {
            slug: slug.clone(),
            new_items: merged.new_items,
            total_items: merged.document.len(),
            files: None,
            avatar: None,
        };

        if merged.is_empty() {
            debug!("No history for {}", entity.name);
            return Ok(outcome);
        }
        debug!(
            "{}: {slug} ({})",
            history_path.display(),
            merged.document.len()
        );

        if files_too {
            let files_dir = self.store.files_dir(kind, &slug);
            outcome.files = Some(self.assets.download_files(&merged.document, &files_dir).await);

            let entity_dir = self.store.entity_dir(kind, &slug);
            outcome.avatar = match self.assets.download_avatar(entity, &entity_dir, &slug).await {
                Ok(avatar) => Some(avatar),
                Err(e) => {
                    warn!("avatar for {} failed: {e}", entity.name);
                    None
                }
            };
        }

        Ok(outcome)
    }
}
