//! HTTP client for the HipChat v2 API.
//!
//! [`ChatApi`] is the seam the mirror talks through; [`HipChatClient`] is
//! the reqwest implementation. The client is constructed once with its
//! credential and endpoint and shared by reference, never held globally.

use crate::config::MirrorConfig;
use crate::error::{SyncError, SyncResult};
use crate::types::*;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Remote operations the mirror depends on.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Lists the whole collection of `kind`, following pagination links.
    async fn list_entities(&self, kind: EntityKind) -> SyncResult<Vec<Entity>>;

    /// Fetches one page of history, newest first. `cursor` is the date of
    /// the oldest item of the previous page; the page starts at or before it.
    async fn fetch_history_page(
        &self,
        kind: EntityKind,
        entity: &Entity,
        page_size: usize,
        cursor: Option<&str>,
    ) -> SyncResult<Vec<HistoryItem>>;

    /// Resolves a file id to its display name and a signed download URL.
    async fn resolve_file(&self, file_id: &str) -> SyncResult<FileInfo>;

    /// Downloads a binary asset.
    async fn download(&self, url: &str) -> SyncResult<Vec<u8>>;
}

/// Collection envelope: `{ "items": [...], "links": { "next": ... } }`.
/// Listing and history payloads share it; `links` may be missing.
#[derive(Deserialize)]
struct Page<T> {
    items: Vec<T>,
    #[serde(default)]
    links: Option<PageLinks>,
}

#[derive(Deserialize)]
struct PageLinks {
    #[serde(default)]
    next: Option<String>,
}

/// HTTP client for the HipChat API.
pub struct HipChatClient {
    client: Client,
    base_url: String,
    token: String,
    room_list_page_size: usize,
}

impl HipChatClient {
    pub fn new(config: &MirrorConfig, token: impl Into<String>) -> SyncResult<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(SyncError::Config("API key is empty".to_string()));
        }

        let client = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token,
            room_list_page_size: config.room_list_page_size,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Makes an authenticated GET and decodes a successful JSON body.
    async fn auth_get<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> SyncResult<T> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| SyncError::Api(e.to_string()))?;

        Ok(resp.json().await?)
    }

    fn listing_query(&self, kind: EntityKind) -> Vec<(&'static str, String)> {
        match kind {
            EntityKind::Rooms => vec![
                ("max-results", self.room_list_page_size.to_string()),
                ("include-archived", "true".to_string()),
                ("expand", "items.participants,items.statistics".to_string()),
            ],
            EntityKind::Users => vec![
                ("expand", "items".to_string()),
                ("include-guests", "true".to_string()),
            ],
        }
    }
}

#[async_trait]
impl ChatApi for HipChatClient {
    async fn list_entities(&self, kind: EntityKind) -> SyncResult<Vec<Entity>> {
        let mut url = format!("{}/v2/{}", self.base_url, kind.api_segment());
        let mut query = self.listing_query(kind);
        let mut entities = Vec::new();

        loop {
            let page: Page<Entity> = self.auth_get(&url, &query).await?;
            debug!("listed {} {kind} (total {})", page.items.len(), entities.len() + page.items.len());
            entities.extend(page.items);

            // `next` already carries the query string.
            match page.links.and_then(|l| l.next) {
                Some(next) if !next.is_empty() && next != url => {
                    url = next;
                    query.clear();
                }
                _ => break,
            }
        }

        Ok(entities)
    }

    async fn fetch_history_page(
        &self,
        kind: EntityKind,
        entity: &Entity,
        page_size: usize,
        cursor: Option<&str>,
    ) -> SyncResult<Vec<HistoryItem>> {
        let url = format!(
            "{}/v2/{}/{}/history",
            self.base_url,
            kind.api_segment(),
            entity.id_string()
        );
        let mut query = vec![
            ("max-results", page_size.to_string()),
            ("reverse", "false".to_string()),
        ];
        if let Some(date) = cursor {
            query.push(("date", date.to_string()));
        }

        let page: Page<HistoryItem> = self.auth_get(&url, &query).await?;
        Ok(page.items)
    }

    async fn resolve_file(&self, file_id: &str) -> SyncResult<FileInfo> {
        let url = format!("{}/v2/file/{file_id}", self.base_url);
        self.auth_get(&url, &[]).await
    }

    async fn download(&self, url: &str) -> SyncResult<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| SyncError::Api(e.to_string()))?;

        Ok(resp.bytes().await?.to_vec())
    }
}
