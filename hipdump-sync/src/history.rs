//! History pagination and merging into the cached document.
//!
//! Pages come back newest first and a `date` cursor set to the oldest item
//! of the previous page walks further into the past. The remote has no
//! reliable "newer than" filter, so every sync starts again at the newest
//! page. Pages start small and grow geometrically; the walk ends at a short
//! page or as soon as an item carries the cached watermark date, since that
//! item and everything older is already on disk.

use crate::api_client::ChatApi;
use crate::config::MirrorConfig;
use crate::error::{SyncError, SyncResult};
use crate::types::{Entity, EntityKind, HistoryItem};
use crate::watermark::HistoryDocument;
use futures::Stream;
use std::collections::VecDeque;
use std::path::Path;
use tracing::{debug, warn};

/// Page sizes for one walk: `initial`, then multiplied by `growth` after
/// every request, capped at `max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageSizer {
    current: usize,
    growth: usize,
    max: usize,
}

impl PageSizer {
    pub fn new(initial: usize, growth: usize, max: usize) -> Self {
        Self {
            current: initial.min(max),
            growth,
            max,
        }
    }

    pub fn from_config(config: &MirrorConfig) -> Self {
        Self::new(config.initial_page_size, config.page_growth, config.max_page_size)
    }

    /// Returns the size for this request and advances to the next.
    pub fn take(&mut self) -> usize {
        let size = self.current;
        self.current = self.current.saturating_mul(self.growth).min(self.max);
        size
    }
}

impl Default for PageSizer {
    fn default() -> Self {
        Self::new(10, 10, 1000)
    }
}

/// Lazily walks one entity's history from the newest item backwards.
///
/// Single use: once it returns `None` it stays exhausted.
pub struct HistoryFetcher<'a> {
    api: &'a dyn ChatApi,
    kind: EntityKind,
    entity: &'a Entity,
    watermark: Option<String>,
    sizer: PageSizer,
    buffer: VecDeque<HistoryItem>,
    /// Date of the oldest item of the previous page.
    cursor: Option<String>,
    more_pages: bool,
    reached_watermark: bool,
    pages: usize,
}

impl<'a> HistoryFetcher<'a> {
    pub fn new(
        api: &'a dyn ChatApi,
        kind: EntityKind,
        entity: &'a Entity,
        watermark: Option<String>,
        sizer: PageSizer,
    ) -> Self {
        Self {
            api,
            kind,
            entity,
            watermark,
            sizer,
            buffer: VecDeque::new(),
            cursor: None,
            more_pages: true,
            reached_watermark: false,
            pages: 0,
        }
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    pub fn reached_watermark(&self) -> bool {
        self.reached_watermark
    }

    /// Next uncached item, newest first. `None` at the start of history or
    /// on reaching the watermark.
    pub async fn next_item(&mut self) -> SyncResult<Option<HistoryItem>> {
        loop {
            if self.reached_watermark {
                return Ok(None);
            }

            if let Some(item) = self.buffer.pop_front() {
                if self.watermark.as_deref() == Some(item.date.as_str()) {
                    debug!("reached cached history at {} for {}", item.date, self.entity.name);
                    self.reached_watermark = true;
                    self.buffer.clear();
                    return Ok(None);
                }
                return Ok(Some(item));
            }

            if !self.more_pages {
                return Ok(None);
            }

            self.fetch_page().await?;
        }
    }

    async fn fetch_page(&mut self) -> SyncResult<()> {
        let size = self.sizer.take();
        debug!(
            "Fetching {size} chats for {} {}{}",
            self.kind.api_segment(),
            self.entity.name,
            self.cursor
                .as_deref()
                .map(|d| format!(" ending {}", d.get(..19).unwrap_or(d)))
                .unwrap_or_default()
        );

        let mut items = self
            .api
            .fetch_history_page(self.kind, self.entity, size, self.cursor.as_deref())
            .await?;
        self.pages += 1;

        // A short page is the last one.
        self.more_pages = items.len() == size;

        let oldest = items.last().map(|item| item.date.clone());
        if self.more_pages && oldest.is_some() && oldest == self.cursor {
            warn!(
                "history cursor for {} stuck at {:?}, stopping",
                self.entity.name, self.cursor
            );
            self.more_pages = false;
        }

        // The cursor date is inclusive, so a page may open with the item
        // that closed the previous one.
        if self.cursor.is_some() && items.first().map(|item| &item.date) == self.cursor.as_ref() {
            items.remove(0);
        }
        if oldest.is_some() {
            self.cursor = oldest;
        }

        self.buffer.extend(items);
        Ok(())
    }

    /// Drains the walk and returns the new items oldest first. Any error
    /// discards everything fetched so far.
    pub async fn collect(mut self) -> SyncResult<Vec<HistoryItem>> {
        let mut items = Vec::new();
        while let Some(item) = self.next_item().await? {
            items.push(item);
        }
        items.reverse();
        Ok(items)
    }

    /// The walk as a stream of items, newest first.
    pub fn into_stream(self) -> impl Stream<Item = SyncResult<HistoryItem>> + 'a {
        futures::stream::try_unfold(self, |mut fetcher| async move {
            Ok::<_, SyncError>(fetcher.next_item().await?.map(|item| (item, fetcher)))
        })
    }
}

/// Result of combining fresh items with a cached document.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryMerge {
    pub document: HistoryDocument,
    pub new_items: usize,
}

impl HistoryMerge {
    /// Neither the cache nor the remote had anything.
    pub fn is_empty(&self) -> bool {
        self.document.is_empty()
    }
}

/// Prepends `fresh` (oldest first, as returned by
/// [`HistoryFetcher::collect`]) to `existing` (newest first), keeping the
/// result newest first.
pub fn merge(existing: HistoryDocument, fresh: Vec<HistoryItem>) -> HistoryMerge {
    let new_items = fresh.len();
    let mut items: Vec<HistoryItem> = fresh.into_iter().rev().collect();
    items.extend(existing.items);
    HistoryMerge {
        document: HistoryDocument::new(items),
        new_items,
    }
}

/// Merges and, when anything new arrived, rewrites the whole document at
/// `path`. With nothing new the file is left untouched.
pub async fn merge_and_persist(
    path: &Path,
    existing: HistoryDocument,
    fresh: Vec<HistoryItem>,
) -> SyncResult<HistoryMerge> {
    let merged = merge(existing, fresh);
    if merged.new_items > 0 {
        merged.document.save(path).await?;
        debug!(
            "{}: {} new, {} total",
            path.display(),
            merged.new_items,
            merged.document.len()
        );
    }
    Ok(merged)
}
