use anyhow::Result;
use clap::Parser;

use hipdump_cli::{check_summary, cli::Cli, execute, init_tracing, render_summary};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let summary = execute(&cli).await?;
    for line in render_summary(&summary) {
        println!("{line}");
    }
    check_summary(&summary)
}
