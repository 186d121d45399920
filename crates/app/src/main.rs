//! crawler: upload every file under a path through FEC-protected agents
//!
//! Behavior is tuned with `CRWL_*` environment variables (see [`config`]);
//! the command line only picks what to crawl.

mod config;
mod fleet;
mod scan;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use config::Config;

/// File crawler uploading over an unreliable datagram link
#[derive(Parser)]
#[command(name = "crawler")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File path to crawl; a directory is crawled file by file
    #[arg(short, long, default_value = "/tmp")]
    path: PathBuf,

    /// Recursively crawl the given directory
    #[arg(long, overrides_with = "no_recurse")]
    recurse: bool,

    /// Only crawl the top level of the directory (default)
    #[arg(long, overrides_with = "recurse")]
    no_recurse: bool,

    /// Seed for agent identities and fault injection (overrides CRWL_SEED)
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }

    // Initialize logging
    let level = if config.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    config.print();

    let files = scan::scan(&cli.path, cli.recurse)
        .with_context(|| format!("cannot crawl {}", cli.path.display()))?;
    if files.is_empty() {
        tracing::warn!("Nothing to upload under {}", cli.path.display());
        return Ok(());
    }

    let report = fleet::run(&config, &files)?;
    tracing::info!(
        "{} agents uploaded {} of {} files",
        report.agents,
        report.uploaded,
        report.files + usize::from(config.session.duplicate_first) * report.agents
    );
    for line in report.metrics.summary().lines() {
        tracing::info!("{}", line);
    }

    Ok(())
}
