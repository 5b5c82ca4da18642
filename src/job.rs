//! One scan-extract-merge-publish run.
//!
//! Order of effects matters for crash safety: nothing is written until every
//! post has been processed, the feed is written before the seen-state, and
//! each file is replaced atomically. A run interrupted at any point leaves
//! both files in their pre-run or post-run state, and posts whose feed write
//! never landed are picked up again next run.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::feed::{load_published, FeedMerger, FeedPublisher, PostRecord, PublishError, PublishOutcome};
use crate::scrape::{
    caught_up, scan_listing, FetchError, HtmlPostExtractor, PageFetcher, PostExtractor, ScanStop,
    SiteClient, SiteListing,
};
use crate::storage::{PersistOutcome, SeenStore, StateError};

/// Failures that abort a run. Per-post extraction failures never get here.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] FetchError),

    /// The first listing page could not be fetched; nothing was changed.
    #[error("First listing page unavailable: {0}")]
    Listing(#[source] FetchError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// What a run did, for the closing log line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pages_scanned: usize,
    /// Distinct post URLs on the scanned pages.
    pub listed: usize,
    /// URLs not seen in any earlier run.
    pub new_urls: usize,
    pub extracted: usize,
    pub failed: usize,
    /// Items in the resulting feed.
    pub entries: usize,
    pub feed_written: bool,
    pub state_written: bool,
    pub dry_run: bool,
}

/// Runs the job against the live site described by `config`.
pub async fn run(config: &Config) -> Result<RunSummary, RunError> {
    config.validate()?;
    let category = config.category_base()?;
    let client = SiteClient::from_config(config).map_err(RunError::Client)?;
    let listing = SiteListing::new(client.clone(), category);
    let extractor = HtmlPostExtractor::new(client);
    run_once(config, &listing, &extractor, Utc::now()).await
}

/// Runs the job with the given collaborators. `now` becomes the feed's
/// `lastBuildDate`.
pub async fn run_once(
    config: &Config,
    fetcher: &dyn PageFetcher,
    extractor: &dyn PostExtractor,
    now: DateTime<Utc>,
) -> Result<RunSummary, RunError> {
    config.validate()?;
    let site = config.category_base()?;

    let mut seen = SeenStore::from_config(config)?;

    let scan = scan_listing(
        fetcher,
        &site,
        config.max_pages_to_scan,
        |url| seen.contains(url),
        caught_up,
    )
    .await
    .map_err(RunError::Listing)?;

    if let ScanStop::FetchFailed { page, error } = &scan.stop {
        tracing::warn!(page = page, error = %error, "Scan ended early on a failed listing page");
    }

    let mut summary = RunSummary {
        pages_scanned: scan.pages.len(),
        listed: scan.listed_count(),
        new_urls: scan.discovered_count(),
        dry_run: config.dry_run,
        ..RunSummary::default()
    };

    // (listing url, record) for every successful extraction, discovery order.
    let mut extracted: Vec<(String, PostRecord)> = Vec::with_capacity(summary.new_urls);
    for url in scan.discovered() {
        match extractor.extract(url).await {
            Ok(record) => extracted.push((url.to_owned(), record)),
            Err(e) => {
                summary.failed += 1;
                tracing::warn!(url = %url, error = %e, "Post extraction failed, will retry next run");
            }
        }
    }
    summary.extracted = extracted.len();

    let existing = load_published(&config.output_path);
    let merged = FeedMerger::from_config(config).merge(
        existing,
        extracted.iter().map(|(_, record)| record.clone()).collect(),
    );
    summary.entries = merged.len();

    let publisher = FeedPublisher::from_config(config);

    if config.dry_run {
        let rendered = publisher.render(&merged, now)?;
        for entry in &merged {
            tracing::info!(
                url = %entry.url(),
                title = %entry.title,
                published = ?entry.published_at,
                "Dry run: would publish"
            );
        }
        tracing::info!(
            path = %config.output_path.display(),
            bytes = rendered.len(),
            "Dry run: feed and state not written"
        );
        return Ok(summary);
    }

    summary.feed_written = publisher.publish(&merged, &config.output_path, now)? == PublishOutcome::Written;

    for (listing_url, record) in &extracted {
        seen.mark_seen(listing_url);
        seen.mark_seen(record.url());
    }
    summary.state_written = seen.persist()? == PersistOutcome::Written;

    Ok(summary)
}
