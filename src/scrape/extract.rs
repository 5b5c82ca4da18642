//! Field extraction from a single post page.
//!
//! Every field is looked up through a fallback chain of selectors: structured
//! metadata (`og:*`, `twitter:*`, `article:*`) first, then common WordPress
//! theme markup. Fields that cannot be found stay empty; in particular a post
//! without a parseable date gets no date rather than the time of the run.

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

use super::client::{FetchError, SiteClient};
use super::PostExtractor;
use crate::feed::{paragraphs_html, PostRecord, UNTITLED};
use crate::util::{clean_text, normalize_post_url, resolve_href, truncate_chars};

const MIN_SUMMARY_CHARS: usize = 40;
const BODY_SUMMARY_CHARS: usize = 280;

/// Per-post failure. The job logs it, skips the post and retries it next run.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to fetch post: {0}")]
    Fetch(#[from] FetchError),

    #[error("Not an http(s) post URL: {0}")]
    InvalidUrl(String),
}

fn selectors(list: &[&str]) -> Vec<Selector> {
    list.iter()
        .map(|css| Selector::parse(css).expect("valid extraction selector"))
        .collect()
}

static META: LazyLock<Selector> = LazyLock::new(|| Selector::parse("meta").expect("valid meta selector"));
static CANONICAL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"link[rel="canonical"]"#).expect("valid canonical selector"));
static TIME: LazyLock<Selector> = LazyLock::new(|| Selector::parse("time").expect("valid time selector"));
static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").expect("valid p selector"));
static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").expect("valid body selector"));

static TITLE_TEXT: LazyLock<Vec<Selector>> =
    LazyLock::new(|| selectors(&["h1.entry-title", "article h1", "h1", "title"]));
static DATE_TEXT: LazyLock<Vec<Selector>> =
    LazyLock::new(|| selectors(&[".entry-date", ".posted-on", ".post-date"]));
static AUTHOR_TEXT: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    selectors(&[".author-name", ".byline .author", ".entry-author", r#"[rel="author"]"#])
});
static CONTENT_CONTAINERS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    selectors(&[
        ".elementor-widget-theme-post-content",
        ".entry-content",
        ".post-content",
        "article",
    ])
});
static FEATURED_IMAGES: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    selectors(&[
        "article img.wp-post-image",
        ".post-thumbnail img",
        ".featured-image img",
        ".entry-content figure img",
        "article img",
    ])
});

/// Fetches post pages through a [`SiteClient`] and parses them.
#[derive(Debug, Clone)]
pub struct HtmlPostExtractor {
    client: SiteClient,
}

impl HtmlPostExtractor {
    pub fn new(client: SiteClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PostExtractor for HtmlPostExtractor {
    async fn extract(&self, url: &str) -> Result<PostRecord, ExtractError> {
        let page_url = Url::parse(url).map_err(|_| ExtractError::InvalidUrl(url.to_owned()))?;
        if !matches!(page_url.scheme(), "http" | "https") {
            return Err(ExtractError::InvalidUrl(url.to_owned()));
        }

        let html = self.client.get_text(page_url.as_str()).await?;
        let record = parse_post_html(&html, &page_url);
        tracing::debug!(
            url = %url,
            canonical = %record.url(),
            dated = record.published_at.is_some(),
            "Extracted post"
        );
        Ok(record)
    }
}

/// Builds a [`PostRecord`] from a fetched post page.
pub fn parse_post_html(html: &str, page_url: &Url) -> PostRecord {
    let document = Html::parse_document(html);

    let title = meta_content(&document, &["og:title", "twitter:title"])
        .or_else(|| first_text(&document, &TITLE_TEXT))
        .unwrap_or_else(|| UNTITLED.to_string());

    let canonical = canonical_url(&document, page_url);
    let image_base = Url::parse(&canonical).unwrap_or_else(|_| page_url.clone());

    PostRecord::new(canonical, title)
        .with_published_at(published_at(&document))
        .with_author(author(&document))
        .with_summary(summary(&document))
        .with_content_html(paragraphs_html(&article_paragraphs(&document)))
        .with_image_url(featured_image(&document, &image_base))
}

/// Cleaned paragraph texts from the first post-content container that has
/// any, skipping paragraphs with no text (image-only and spacer paragraphs).
pub fn article_paragraphs(document: &Html) -> Vec<String> {
    for container_selector in CONTENT_CONTAINERS.iter() {
        for container in document.select(container_selector) {
            let paragraphs: Vec<String> = container
                .select(&PARAGRAPH)
                .map(element_text)
                .filter(|text| !text.is_empty())
                .collect();
            if !paragraphs.is_empty() {
                return paragraphs;
            }
        }
    }
    Vec::new()
}

/// Parses the date formats WordPress themes and metadata commonly emit.
///
/// Naive date-times and bare dates are taken as UTC. Text such as
/// "Posted on February 18, 2026" is accepted by looking at the trailing
/// "Month D, YYYY" words.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    let words: Vec<&str> = raw.split_whitespace().collect();
    let tail = words[words.len().saturating_sub(3)..].join(" ");
    ["%B %d, %Y", "%b %d, %Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&tail, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn published_at(document: &Html) -> Option<DateTime<Utc>> {
    for time in document.select(&TIME) {
        if let Some(dt) = time.value().attr("datetime").and_then(parse_datetime) {
            return Some(dt);
        }
        if let Some(dt) = parse_datetime(&element_text(time)) {
            return Some(dt);
        }
    }

    let raw = meta_content(document, &["article:published_time", "og:published_time"])
        .or_else(|| first_text(document, &DATE_TEXT))?;
    parse_datetime(&raw)
}

fn canonical_url(document: &Html, page_url: &Url) -> String {
    let canonical = document
        .select(&CANONICAL)
        .filter_map(|link| link.value().attr("href"))
        .find_map(|href| resolve_href(page_url, href))
        .or_else(|| {
            meta_content(document, &["og:url"]).and_then(|href| resolve_href(page_url, &href))
        });

    match canonical {
        Some(url) => normalize_post_url(url.as_str()),
        None => normalize_post_url(page_url.as_str()),
    }
}

fn author(document: &Html) -> Option<String> {
    // `article:author` is often a profile URL rather than a name.
    meta_content(document, &["author", "article:author"])
        .filter(|value| !value.contains("://"))
        .or_else(|| first_text(document, &AUTHOR_TEXT))
}

fn summary(document: &Html) -> Option<String> {
    let paragraphs = article_paragraphs(document);
    if let Some(long) = paragraphs
        .iter()
        .find(|p| p.chars().count() >= MIN_SUMMARY_CHARS)
    {
        return Some(long.clone());
    }
    if let Some(first) = paragraphs.into_iter().next() {
        return Some(first);
    }

    let body = document
        .select(&BODY)
        .next()
        .map(element_text)
        .unwrap_or_else(|| element_text(document.root_element()));
    let body = truncate_chars(&body, BODY_SUMMARY_CHARS).trim_end().to_string();
    (!body.is_empty()).then_some(body)
}

fn featured_image(document: &Html, base: &Url) -> Option<String> {
    if let Some(url) = meta_content(document, &["og:image", "twitter:image"])
        .and_then(|src| resolve_href(base, &src))
    {
        return Some(url.into());
    }

    for selector in FEATURED_IMAGES.iter() {
        let Some(img) = document.select(selector).next() else {
            continue;
        };
        let attrs = img.value();
        let srcset_first = attrs
            .attr("srcset")
            .and_then(|srcset| srcset.split_whitespace().next());
        let resolved = [attrs.attr("src"), attrs.attr("data-src"), attrs.attr("data-lazy-src"), srcset_first]
            .into_iter()
            .flatten()
            .find_map(|src| resolve_href(base, src));
        if let Some(url) = resolved {
            return Some(url.into());
        }
    }
    None
}

/// First non-empty `content` of a `<meta>` whose `property` or `name` matches
/// one of `keys`, in key priority order.
fn meta_content(document: &Html, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        document.select(&META).find_map(|meta| {
            let attrs = meta.value();
            let matches = attrs.attr("property") == Some(*key) || attrs.attr("name") == Some(*key);
            if !matches {
                return None;
            }
            let content = clean_text(attrs.attr("content").unwrap_or_default());
            (!content.is_empty()).then_some(content)
        })
    })
}

fn first_text(document: &Html, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        document
            .select(selector)
            .map(element_text)
            .find(|text| !text.is_empty())
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}
