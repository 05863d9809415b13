//! Shared fixtures: history builders and an in-memory remote.
#![allow(dead_code)]

use async_trait::async_trait;
use hipdump_sync::{ChatApi, Entity, EntityKind, FileInfo, HistoryItem, SyncError, SyncResult};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// ISO-8601 timestamp for the `n`th second of 2016, so lexical order
/// matches chronological order.
pub fn ts(n: usize) -> String {
    let day = 1 + n / 86_400;
    let rem = n % 86_400;
    format!(
        "2016-01-{day:02}T{:02}:{:02}:{:02}.000000+00:00",
        rem / 3600,
        (rem / 60) % 60,
        rem % 60
    )
}

pub fn item(n: usize) -> HistoryItem {
    let mut item = HistoryItem::new(ts(n));
    item.fields
        .insert("message".into(), serde_json::json!(format!("message {n}")));
    item.fields.insert("id".into(), serde_json::json!(format!("msg-{n}")));
    item
}

pub fn item_with_file(n: usize, file_id: &str) -> HistoryItem {
    let mut item = item(n);
    item.fields.insert(
        "authenticated_file".into(),
        serde_json::json!({ "id": file_id, "name": format!("upload-{n}.txt") }),
    );
    item
}

/// Items `first..=last`, oldest first.
pub fn items(first: usize, last: usize) -> Vec<HistoryItem> {
    (first..=last).map(item).collect()
}

pub fn dates(items: &[HistoryItem]) -> Vec<String> {
    items.iter().map(|i| i.date.clone()).collect()
}

pub fn room(id: u64, name: &str) -> Entity {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "name": name,
        "privacy": "public",
        "links": { "self": format!("https://api.hipchat.com/v2/room/{id}") }
    }))
    .unwrap()
}

pub fn user(id: u64, name: &str, email: &str, photo_url: Option<&str>) -> Entity {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "name": name,
        "mention_name": name.replace(' ', ""),
        "email": email,
        "photo_url": photo_url,
    }))
    .unwrap()
}

/// A scripted remote. History is kept oldest first and served newest
/// first with an inclusive `date` cursor, like the real endpoint.
#[derive(Default)]
pub struct ScriptedApi {
    pub entities: HashMap<EntityKind, Vec<Entity>>,
    pub history: Mutex<HashMap<String, Vec<HistoryItem>>>,
    pub files: HashMap<String, FileInfo>,
    pub blobs: HashMap<String, Vec<u8>>,
    /// Entity ids whose history requests fail.
    pub failing: HashSet<String>,
    /// Collections whose listing fails.
    pub failing_listings: HashSet<EntityKind>,
    /// `(entity id, page size, cursor)` per history request.
    pub page_requests: Mutex<Vec<(String, usize, Option<String>)>>,
    /// Kind each history request was made for.
    pub request_kinds: Mutex<Vec<EntityKind>>,
    pub list_calls: AtomicUsize,
    pub resolve_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entities(mut self, kind: EntityKind, entities: Vec<Entity>) -> Self {
        self.entities.insert(kind, entities);
        self
    }

    pub fn with_history(self, entity_id: &str, items: Vec<HistoryItem>) -> Self {
        self.history
            .lock()
            .unwrap()
            .insert(entity_id.to_string(), items);
        self
    }

    pub fn with_file(mut self, file_id: &str, name: &str, url: &str, bytes: &[u8]) -> Self {
        let info: FileInfo = serde_json::from_value(serde_json::json!({
            "name": name,
            "temp_download_url": url,
        }))
        .unwrap();
        self.files.insert(file_id.to_string(), info);
        self.blobs.insert(url.to_string(), bytes.to_vec());
        self
    }

    pub fn with_blob(mut self, url: &str, bytes: &[u8]) -> Self {
        self.blobs.insert(url.to_string(), bytes.to_vec());
        self
    }

    pub fn failing_for(mut self, entity_id: &str) -> Self {
        self.failing.insert(entity_id.to_string());
        self
    }

    pub fn failing_listing(mut self, kind: EntityKind) -> Self {
        self.failing_listings.insert(kind);
        self
    }

    /// Appends newer items to an entity's remote history.
    pub fn push_history(&self, entity_id: &str, items: Vec<HistoryItem>) {
        self.history
            .lock()
            .unwrap()
            .entry(entity_id.to_string())
            .or_default()
            .extend(items);
    }

    pub fn page_sizes(&self) -> Vec<usize> {
        self.page_requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, size, _)| *size)
            .collect()
    }

    pub fn history_requests(&self) -> usize {
        self.page_requests.lock().unwrap().len()
    }

    pub fn downloads(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    pub fn resolves(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatApi for ScriptedApi {
    async fn list_entities(&self, kind: EntityKind) -> SyncResult<Vec<Entity>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_listings.contains(&kind) {
            return Err(SyncError::Api(format!("503 Service Unavailable for /v2/{kind}")));
        }
        Ok(self.entities.get(&kind).cloned().unwrap_or_default())
    }

    async fn fetch_history_page(
        &self,
        kind: EntityKind,
        entity: &Entity,
        page_size: usize,
        cursor: Option<&str>,
    ) -> SyncResult<Vec<HistoryItem>> {
        let id = entity.id_string();
        self.request_kinds.lock().unwrap().push(kind);
        self.page_requests
            .lock()
            .unwrap()
            .push((id.clone(), page_size, cursor.map(str::to_string)));

        if self.failing.contains(&id) {
            return Err(SyncError::Api(format!("500 Internal Server Error for {id}")));
        }

        let history = self.history.lock().unwrap();
        let all = history.get(&id).cloned().unwrap_or_default();
        Ok(all
            .into_iter()
            .rev()
            .filter(|item| cursor.is_none_or(|c| item.date.as_str() <= c))
            .take(page_size)
            .collect())
    }

    async fn resolve_file(&self, file_id: &str) -> SyncResult<FileInfo> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.files
            .get(file_id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("file {file_id}")))
    }

    async fn download(&self, url: &str) -> SyncResult<Vec<u8>> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.blobs
            .get(url)
            .cloned()
            .ok_or_else(|| SyncError::Api(format!("404 Not Found for {url}")))
    }
}
