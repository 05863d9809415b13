//! Cached history documents and their watermark.

use crate::error::SyncResult;
use crate::store::{read_json, write_json};
use crate::types::HistoryItem;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// An entity's cached history, most recent item first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryDocument {
    pub items: Vec<HistoryItem>,
}

impl HistoryDocument {
    pub fn new(items: Vec<HistoryItem>) -> Self {
        Self { items }
    }

    /// Loads the document at `path`. Absent or unparseable files give an
    /// empty document, which means the next fetch starts from scratch.
    pub async fn load(path: &Path) -> Self {
        read_json(path).await.unwrap_or_default()
    }

    /// Overwrites `path` with the full document.
    pub async fn save(&self, path: &Path) -> SyncResult<()> {
        write_json(path, self).await
    }

    /// Date of the newest cached item.
    pub fn watermark(&self) -> Option<&str> {
        self.items.first().map(|item| item.date.as_str())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Ids of every attachment referenced by the document, in document order.
    pub fn attachment_ids(&self) -> impl Iterator<Item = String> + '_ {
        self.items.iter().filter_map(HistoryItem::attachment_id)
    }
}
