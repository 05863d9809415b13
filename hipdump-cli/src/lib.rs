//! Command line front end for the HipChat history mirror.

pub mod cli;

use anyhow::{Context, Result, bail};
use hipdump_sync::{HipChatClient, Mirror, RunSummary};
use std::sync::Arc;
use tracing::warn;

use crate::cli::Cli;

/// Installs the stderr subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Validates the invocation and runs the mirror.
///
/// Configuration problems are reported before any request is made.
pub async fn execute(cli: &Cli) -> Result<RunSummary> {
    let targets = cli.targets();
    targets.validate()?;
    let config = cli.config();
    config.validate()?;

    if targets.is_empty() {
        warn!("nothing selected; pass --avatars, --users and/or --rooms");
    }

    let client = HipChatClient::new(&config, cli.key.clone())?;
    let mirror = Mirror::new(Arc::new(client), &config);
    let summary = mirror
        .run(targets)
        .await
        .with_context(|| format!("mirroring into {}", config.output_dir.display()))?;
    Ok(summary)
}

/// One line per collection, plus avatars.
pub fn render_summary(summary: &RunSummary) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(avatars) = &summary.avatars {
        lines.push(format!(
            "avatars: {} downloaded, {} present, {} skipped, {} failed, {} abandoned",
            avatars.downloaded, avatars.present, avatars.skipped, avatars.failed, avatars.abandoned
        ));
    }
    for collection in &summary.collections {
        lines.push(format!(
            "{}: {} synced, {} new items, {} failed",
            collection.kind,
            collection.synced.len(),
            collection.new_items(),
            collection.failed.len()
        ));
        for failure in &collection.failed {
            lines.push(format!("  {} {}: {}", collection.kind, failure.name, failure.error));
        }
    }
    for failure in &summary.failed_targets {
        lines.push(format!("{}: not synced: {}", failure.target, failure.error));
    }
    lines
}

/// Fails when any target or entity could not be synced.
pub fn check_summary(summary: &RunSummary) -> Result<()> {
    if !summary.failed_targets.is_empty() {
        let targets: Vec<&str> = summary
            .failed_targets
            .iter()
            .map(|f| f.target.as_str())
            .collect();
        bail!("could not sync {}", targets.join(", "));
    }
    if !summary.is_success() {
        bail!("{} entities failed to sync", summary.failed_entities());
    }
    Ok(())
}
