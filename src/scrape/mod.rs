//! Scraping the source site.
//!
//! - [`client`] - reqwest wrapper with timeouts, retries, size limits and pacing
//! - [`listing`] - category page URLs and post-link extraction
//! - [`paging`] - the page-by-page scan with an explicit stop predicate
//! - [`extract`] - per-post field extraction
//!
//! The job talks to the site only through [`PageFetcher`] and
//! [`PostExtractor`], so tests can drive it with canned pages.

mod client;
mod extract;
mod listing;
mod paging;

use async_trait::async_trait;
use url::Url;

use crate::feed::PostRecord;

pub use client::{FetchError, SiteClient};
pub use extract::{article_paragraphs, parse_datetime, parse_post_html, ExtractError, HtmlPostExtractor};
pub use listing::{extract_post_urls, listing_page_url, looks_like_post_url, SiteListing};
pub use paging::{caught_up, scan_listing, ListingScan, PageScan, ScanStop};

/// One fetched listing page.
#[derive(Debug, Clone)]
pub struct ListingPage {
    /// 1-based page index.
    pub index: usize,
    pub url: Url,
    pub html: String,
}

/// Source of category listing pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, index: usize) -> Result<ListingPage, FetchError>;
}

/// Turns a post URL into a [`PostRecord`].
#[async_trait]
pub trait PostExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<PostRecord, ExtractError>;
}
