//! Category listing pages: page URLs and the post links found on them.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use super::client::{FetchError, SiteClient};
use super::{ListingPage, PageFetcher};
use crate::util::{normalize_post_url, resolve_href};

/// Post-title anchors used by common WordPress themes, in priority order.
static TITLE_LINKS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        "article h1 a[href]",
        "article h2 a[href]",
        "article h3 a[href]",
        ".entry-title a[href]",
        ".post-title a[href]",
        ".td-module-title a[href]",
    ]
    .iter()
    .map(|css| Selector::parse(css).expect("valid title link selector"))
    .collect()
});

static ANY_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid link selector"));

/// Fetches the category's listing pages over HTTP.
#[derive(Debug, Clone)]
pub struct SiteListing {
    client: SiteClient,
    category: Url,
}

impl SiteListing {
    pub fn new(client: SiteClient, category: Url) -> Self {
        Self { client, category }
    }
}

#[async_trait]
impl PageFetcher for SiteListing {
    async fn fetch_page(&self, index: usize) -> Result<ListingPage, FetchError> {
        let url = listing_page_url(&self.category, index);
        tracing::info!(page = index, url = %url, "Scanning listing page");
        let html = self.client.get_text(url.as_str()).await?;
        Ok(ListingPage { index, url, html })
    }
}

/// Page 1 is the category URL itself; page `n` is `<category>page/<n>/`.
///
/// `category` must end with `/` (see [`crate::config::Config::category_base`]).
pub fn listing_page_url(category: &Url, page: usize) -> Url {
    if page <= 1 {
        return category.clone();
    }
    category
        .join(&format!("page/{page}/"))
        .unwrap_or_else(|_| category.clone())
}

/// Extracts normalized post URLs from one listing page, in document order and
/// without duplicates.
///
/// Title anchors are preferred; when a theme has none of the known title
/// markup, every link on the page is considered instead. Only links that
/// [`looks_like_post_url`] accepts for `site` are returned.
pub fn extract_post_urls(html: &str, page_url: &Url, site: &Url) -> Vec<String> {
    let document = Html::parse_document(html);

    let mut anchors: Vec<_> = TITLE_LINKS
        .iter()
        .flat_map(|selector| document.select(selector))
        .collect();
    if anchors.is_empty() {
        anchors = document.select(&ANY_LINK).collect();
    }

    let mut seen = HashSet::new();
    let mut urls = Vec::new();
    for anchor in anchors {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(resolved) = resolve_href(page_url, href) else {
            continue;
        };
        let normalized = normalize_post_url(resolved.as_str());
        let Ok(candidate) = Url::parse(&normalized) else {
            continue;
        };
        if !looks_like_post_url(&candidate, site) {
            continue;
        }
        if seen.insert(normalized.clone()) {
            urls.push(normalized);
        }
    }
    urls
}

/// Whether `url` points at an individual post on `site`.
///
/// Rejects other hosts, the site root, single-segment pages, and WordPress
/// index paths: categories, tags, authors, `wp-*`, feeds, pagination and
/// date archives such as `/2026/02/18/`.
pub fn looks_like_post_url(url: &Url, site: &Url) -> bool {
    if !same_site(url, site) {
        return false;
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let Some(first) = segments.first() else {
        return false;
    };
    if segments.len() < 2 {
        return false;
    }
    if segments.contains(&"category") {
        return false;
    }
    if matches!(*first, "tag" | "author" | "page") || first.starts_with("wp-") || first.starts_with("feed") {
        return false;
    }
    if segments.last().is_some_and(|last| *last == "page" || *last == "feed") {
        return false;
    }
    if segments
        .windows(2)
        .any(|pair| pair[0] == "page" && is_numeric(pair[1]))
    {
        return false;
    }
    if segments.iter().all(|seg| is_numeric(seg)) {
        return false;
    }
    true
}

fn same_site(url: &Url, site: &Url) -> bool {
    match (url.host_str(), site.host_str()) {
        (Some(a), Some(b)) => bare_host(a).eq_ignore_ascii_case(bare_host(b)),
        _ => false,
    }
}

fn bare_host(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

fn is_numeric(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}
