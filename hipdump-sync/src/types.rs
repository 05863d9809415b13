//! Shared types for mirror operations.

use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The two mirrored collections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Rooms,
    Users,
}

impl EntityKind {
    /// Directory and snapshot name in the local store.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Rooms => "rooms",
            EntityKind::Users => "users",
        }
    }

    /// Singular path segment used by the history endpoint.
    pub fn api_segment(&self) -> &'static str {
        match self {
            EntityKind::Rooms => "room",
            EntityKind::Users => "user",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A room or user as returned by the listing endpoints.
///
/// Only `id` and `name` are typed. Every other field stays in `extra`
/// exactly as the API sent it, explicit nulls included, so the cached
/// snapshot round-trips unchanged. Whether an entity is a room or a user
/// is decided by the collection it was listed from, never by its fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: Value,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity {
    /// The remote id rendered for use in URLs.
    pub fn id_string(&self) -> String {
        value_to_id(&self.id)
    }

    pub fn mention_name(&self) -> Option<&str> {
        self.text_field("mention_name")
    }

    pub fn email(&self) -> Option<&str> {
        self.text_field("email")
    }

    pub fn photo_url(&self) -> Option<&str> {
        self.text_field("photo_url")
    }

    /// A non-empty string field; null, missing and non-string values read
    /// as absent.
    fn text_field(&self, key: &str) -> Option<&str> {
        self.extra
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Name the entity's directory is derived from, before slugging.
    ///
    /// Users go by the local part of their email, then their mention name,
    /// then their id. Rooms go by their name.
    pub fn base_name(&self, kind: EntityKind) -> String {
        match kind {
            EntityKind::Users => self
                .email()
                .and_then(|email| email.split('@').next())
                .filter(|local| !local.is_empty())
                .or(self.mention_name())
                .map(str::to_string)
                .unwrap_or_else(|| self.id_string()),
            EntityKind::Rooms => self.name.clone(),
        }
    }
}

/// One message or event in an entity's history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    /// ISO-8601 timestamp, the ordering key.
    pub date: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl HistoryItem {
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            fields: Map::new(),
        }
    }

    /// Id of the attached file, when the item carries `authenticated_file.id`.
    pub fn attachment_id(&self) -> Option<String> {
        match self.fields.get("authenticated_file")?.get("id")? {
            Value::Null => None,
            id => Some(value_to_id(id)),
        }
    }
}

/// File resource returned by `/v2/file/{id}`.
///
/// This payload has no hypermedia `links`, unlike most API objects, so
/// `links` is optional here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub temp_download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FileInfo {
    /// Last `/`-separated segment of the remote name.
    pub fn base_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    pub fn download_url(&self) -> Option<&str> {
        self.temp_download_url.as_deref().filter(|u| !u.is_empty())
    }
}

/// Result of a single skip-if-present download.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetOutcome {
    Downloaded,
    AlreadyPresent,
    /// Nothing to fetch (e.g. a user without a photo).
    NoSource,
}

/// Tally of an avatar batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AvatarReport {
    pub downloaded: usize,
    pub present: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Still running when the batch deadline expired.
    pub abandoned: usize,
}

impl AvatarReport {
    pub fn record(&mut self, outcome: AssetOutcome) {
        match outcome {
            AssetOutcome::Downloaded => self.downloaded += 1,
            AssetOutcome::AlreadyPresent => self.present += 1,
            AssetOutcome::NoSource => self.skipped += 1,
        }
    }
}

/// Tally of attachment downloads for one entity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileReport {
    pub downloaded: usize,
    pub present: usize,
    pub failed: usize,
}

/// What one entity's sync pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityOutcome {
    pub slug: String,
    pub new_items: usize,
    pub total_items: usize,
    pub files: Option<FileReport>,
    pub avatar: Option<AssetOutcome>,
}

/// An entity whose sync pass failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityFailure {
    pub name: String,
    pub error: String,
}

/// Outcome of syncing one collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionReport {
    pub kind: EntityKind,
    pub synced: Vec<EntityOutcome>,
    pub failed: Vec<EntityFailure>,
}

impl CollectionReport {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            synced: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn new_items(&self) -> usize {
        self.synced.iter().map(|o| o.new_items).sum()
    }
}

/// A requested target that could not run at all, typically because its
/// collection could not be listed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetFailure {
    /// `avatars`, `users` or `rooms`.
    pub target: String,
    pub error: String,
}

/// Everything a run did, across all requested targets.
#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    pub avatars: Option<AvatarReport>,
    pub collections: Vec<CollectionReport>,
    pub failed_targets: Vec<TargetFailure>,
}

impl RunSummary {
    pub fn failed_entities(&self) -> usize {
        self.collections.iter().map(|c| c.failed.len()).sum()
    }

    pub fn is_success(&self) -> bool {
        self.failed_entities() == 0 && self.failed_targets.is_empty()
    }

    pub(crate) fn record_target_failure(&mut self, target: &str, error: &SyncError) {
        self.failed_targets.push(TargetFailure {
            target: target.to_string(),
            error: error.to_string(),
        });
    }
}

pub(crate) fn value_to_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
