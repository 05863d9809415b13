//! Incremental mirror for HipChat history.
//!
//! Pulls room and user history into a local directory tree and keeps it
//! current across scheduled runs:
//! - Newest-first history pagination with adaptive page sizes
//! - Overlap termination against the locally cached watermark
//! - Read-merge-write of per-entity history documents
//! - Skip-if-present downloads for avatars and shared files

pub mod api_client;
pub mod assets;
pub mod config;
pub mod error;
pub mod history;
pub mod mirror;
pub mod slug;
pub mod store;
pub mod types;
pub mod watermark;

pub use api_client::{ChatApi, HipChatClient};
pub use config::{MirrorConfig, SyncTargets};
pub use error::{SyncError, SyncResult};
pub use mirror::Mirror;
pub use store::LocalStore;
pub use types::*;
