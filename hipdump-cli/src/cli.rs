use clap::Parser;
use hipdump_sync::{MirrorConfig, SyncTargets};
use std::path::PathBuf;

/// Dump HipChat history for rooms and users.
#[derive(Parser, Debug)]
#[command(name = "hipdump", author, version, about)]
pub struct Cli {
    /// HipChat API key from https://www.hipchat.com/account/api
    #[arg(short, long)]
    pub key: String,
    /// Directory for data dump.
    #[arg(short, long, default_value = "history")]
    pub path: PathBuf,
    /// Dump avatars for all users.
    #[arg(short, long)]
    pub avatars: bool,
    /// Dump history for all users.
    #[arg(short, long)]
    pub users: bool,
    /// Dump history for all rooms.
    #[arg(short, long)]
    pub rooms: bool,
    /// Dump files for dumped history.
    #[arg(short, long)]
    pub files: bool,
    /// API endpoint.
    #[arg(long, default_value = "https://api.hipchat.com")]
    pub endpoint: String,
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn targets(&self) -> SyncTargets {
        SyncTargets {
            avatars: self.avatars,
            rooms: self.rooms,
            users: self.users,
            files: self.files,
        }
    }

    pub fn config(&self) -> MirrorConfig {
        MirrorConfig {
            api_base_url: self.endpoint.clone(),
            output_dir: self.path.clone(),
            ..MirrorConfig::default()
        }
    }
}
