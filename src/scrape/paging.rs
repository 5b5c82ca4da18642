use std::collections::HashSet;

use url::Url;

use super::client::FetchError;
use super::listing::extract_post_urls;
use super::PageFetcher;

/// What one listing page contributed to the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageScan {
    /// 1-based page index.
    pub index: usize,
    pub url: Url,
    /// Every post URL on the page, in page order.
    pub urls: Vec<String>,
    /// The subset of `urls` neither seen in earlier runs nor found on an
    /// earlier page of this scan.
    pub fresh: Vec<String>,
}

/// Why the scan ended.
#[derive(Debug)]
pub enum ScanStop {
    /// The stop predicate fired on this page.
    CaughtUp(usize),
    /// `max_pages` pages were scanned.
    MaxPages,
    /// This page (never page 1) failed to fetch; earlier pages are kept.
    FetchFailed { page: usize, error: FetchError },
}

/// Result of a listing scan.
#[derive(Debug)]
pub struct ListingScan {
    pub pages: Vec<PageScan>,
    pub stop: ScanStop,
}

impl ListingScan {
    /// Fresh URLs in discovery order: newest page first, page order within
    /// a page.
    pub fn discovered(&self) -> impl Iterator<Item = &str> {
        self.pages
            .iter()
            .flat_map(|page| page.fresh.iter().map(String::as_str))
    }

    pub fn discovered_count(&self) -> usize {
        self.pages.iter().map(|page| page.fresh.len()).sum()
    }

    /// All distinct post URLs seen on the scanned pages.
    pub fn listed_count(&self) -> usize {
        self.pages
            .iter()
            .flat_map(|page| page.urls.iter())
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Default stop rule: a page with nothing new means the listing has caught
/// up with what earlier runs already processed.
pub fn caught_up(page: &PageScan) -> bool {
    page.fresh.is_empty()
}

/// Walks listing pages `1..=max_pages`, collecting post URLs that
/// `is_seen` does not already know.
///
/// After each page, `stop` decides whether to keep paging. A failure on page
/// 1 is returned as an error since nothing is known about the listing; a
/// failure on a later page ends the scan with what was gathered so far.
pub async fn scan_listing<F, S>(
    fetcher: &F,
    site: &Url,
    max_pages: usize,
    is_seen: impl Fn(&str) -> bool,
    stop: S,
) -> Result<ListingScan, FetchError>
where
    F: PageFetcher + ?Sized,
    S: Fn(&PageScan) -> bool,
{
    let mut pages = Vec::new();
    let mut found: HashSet<String> = HashSet::new();

    for index in 1..=max_pages {
        let page = match fetcher.fetch_page(index).await {
            Ok(page) => page,
            Err(error) if index == 1 => return Err(error),
            Err(error) => {
                tracing::warn!(page = index, error = %error, "Listing page failed, stopping pagination");
                return Ok(ListingScan {
                    pages,
                    stop: ScanStop::FetchFailed { page: index, error },
                });
            }
        };

        let urls = extract_post_urls(&page.html, &page.url, site);
        let fresh: Vec<String> = urls
            .iter()
            .filter(|url| !is_seen(url.as_str()) && !found.contains(url.as_str()))
            .cloned()
            .collect();
        found.extend(urls.iter().cloned());

        tracing::info!(
            page = index,
            listed = urls.len(),
            fresh = fresh.len(),
            "Scanned listing page"
        );

        let scan = PageScan {
            index,
            url: page.url,
            urls,
            fresh,
        };
        let done = stop(&scan);
        pages.push(scan);

        if done {
            tracing::info!(page = index, "Listing caught up, stopping pagination");
            return Ok(ListingScan {
                pages,
                stop: ScanStop::CaughtUp(index),
            });
        }
    }

    Ok(ListingScan {
        pages,
        stop: ScanStop::MaxPages,
    })
}
