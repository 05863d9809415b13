//! Mirror configuration.

use crate::error::{SyncError, SyncResult};
use crate::types::EntityKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the history mirror.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Base URL for the HipChat API (e.g., "https://api.hipchat.com").
    pub api_base_url: String,

    /// Root of the local store.
    pub output_dir: PathBuf,

    /// Per-request timeout for API calls and downloads.
    pub request_timeout_secs: u64,

    /// Ceiling for a whole avatar batch. Downloads still pending at the
    /// deadline are abandoned.
    pub avatar_deadline_secs: u64,

    /// Maximum simultaneous avatar downloads.
    pub avatar_concurrency: usize,

    /// Page size of the first history request.
    pub initial_page_size: usize,

    /// Upper bound for history page sizes.
    pub max_page_size: usize,

    /// Factor applied to the page size after every request.
    pub page_growth: usize,

    /// `max-results` used when listing rooms.
    pub room_list_page_size: usize,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.hipchat.com".to_string(),
            output_dir: PathBuf::from("history"),
            request_timeout_secs: 30,
            avatar_deadline_secs: 5,
            avatar_concurrency: 16,
            initial_page_size: 10,
            max_page_size: 1000,
            page_growth: 10,
            room_list_page_size: 1000,
        }
    }
}

impl MirrorConfig {
    /// Creates a config pointed at a mock server and a scratch directory.
    #[cfg(test)]
    pub fn test(api_base_url: &str, output_dir: PathBuf) -> Self {
        Self {
            api_base_url: api_base_url.to_string(),
            output_dir,
            request_timeout_secs: 5,
            avatar_deadline_secs: 1,
            ..Self::default()
        }
    }

    pub fn avatar_deadline(&self) -> Duration {
        Duration::from_secs(self.avatar_deadline_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Rejects settings that would make pagination or fan-out meaningless.
    pub fn validate(&self) -> SyncResult<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(SyncError::Config("api_base_url is empty".to_string()));
        }
        if self.initial_page_size == 0 || self.max_page_size == 0 {
            return Err(SyncError::Config("page sizes must be positive".to_string()));
        }
        if self.initial_page_size > self.max_page_size {
            return Err(SyncError::Config(format!(
                "initial_page_size {} exceeds max_page_size {}",
                self.initial_page_size, self.max_page_size
            )));
        }
        if self.page_growth < 2 {
            return Err(SyncError::Config("page_growth must be at least 2".to_string()));
        }
        if self.avatar_concurrency == 0 {
            return Err(SyncError::Config("avatar_concurrency must be positive".to_string()));
        }
        Ok(())
    }
}

/// Which collections and assets a run should mirror.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTargets {
    pub avatars: bool,
    pub rooms: bool,
    pub users: bool,
    pub files: bool,
}

impl SyncTargets {
    /// Files are scanned from mirrored history, so they need a history target.
    pub fn validate(&self) -> SyncResult<()> {
        if self.files && !(self.rooms || self.users) {
            return Err(SyncError::Config(
                "--files requires --rooms and/or --users".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether history for `kind` was requested.
    pub fn includes(&self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::Rooms => self.rooms,
            EntityKind::Users => self.users,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.avatars || self.rooms || self.users)
    }
}
