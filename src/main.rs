use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use topstory_rss::Config;

#[derive(Parser, Debug)]
#[command(
    name = "topstory-rss",
    about = "Publish a WordPress category's newest posts as an RSS feed"
)]
struct Args {
    /// TOML config file (missing file means defaults)
    #[arg(long, value_name = "FILE", default_value = "topstory-rss.toml")]
    config: PathBuf,

    /// Maximum number of listing pages to scan
    #[arg(long, value_name = "N")]
    max_pages: Option<usize>,

    /// Maximum number of items in the published feed
    #[arg(long, value_name = "N")]
    recent: Option<usize>,

    /// Where to write the RSS file
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Where to keep the seen-URL state
    #[arg(long, value_name = "FILE")]
    state: Option<PathBuf>,

    /// Run without writing the feed or the state file
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let Some(n) = self.max_pages {
            config.max_pages_to_scan = n;
        }
        if let Some(n) = self.recent {
            config.recent_to_include = n;
        }
        if let Some(path) = self.output {
            config.output_path = path;
        }
        if let Some(path) = self.state {
            config.state_path = path;
        }
        if self.dry_run {
            config.dry_run = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from '{}'", args.config.display()))?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let summary = topstory_rss::run(&config).await.context("Feed update failed")?;

    tracing::info!(
        pages = summary.pages_scanned,
        listed = summary.listed,
        new = summary.new_urls,
        extracted = summary.extracted,
        failed = summary.failed,
        entries = summary.entries,
        feed_written = summary.feed_written,
        state_written = summary.state_written,
        dry_run = summary.dry_run,
        "Run complete"
    );

    Ok(())
}
