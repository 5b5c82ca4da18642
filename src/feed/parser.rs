//! Reads a previously published feed back into entries.
//!
//! The merge needs the currently published list as input. Rather than keeping
//! a second copy in the state file, the published document itself is the
//! source of truth: it is parsed with `feed-rs`, and the fields our own
//! publisher folded into the description HTML are recovered from it.

use std::path::Path;

use anyhow::Result;
use feed_rs::model::Person;
use feed_rs::parser;
use scraper::{ElementRef, Html, Selector};

use super::model::{FeedEntryList, PostRecord, UNTITLED};
use super::rss::{paragraphs_html, CONTENT_CLASS, CONTENT_TAG};
use crate::util::clean_text;

/// Name feed-rs gives an RSS `<author>`, whose text it stores as the email.
const RSS_AUTHOR_ROLE: &str = "author";

/// Result of parsing a published feed, including the number of items that
/// had to be dropped.
#[derive(Debug, Default)]
pub struct ParseResult {
    pub entries: Vec<PostRecord>,
    /// Items with neither a guid nor a link.
    pub skipped: usize,
}

/// Parses RSS/Atom bytes into entries, preserving document order.
pub fn parse_feed(bytes: &[u8]) -> Result<ParseResult> {
    let feed = parser::parse(bytes)?;

    let mut result = ParseResult::default();
    for entry in feed.entries {
        let guid = entry.id.trim();
        let url = if !guid.is_empty() && guid.contains("://") {
            guid.to_owned()
        } else if let Some(link) = entry.links.first() {
            link.href.trim().to_owned()
        } else {
            result.skipped += 1;
            continue;
        };

        let title = entry
            .title
            .map(|t| clean_text(&t.content))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTITLED.to_string());

        let author = entry.authors.first().and_then(author_name);

        let fields = entry
            .summary
            .map(|s| description_fields(&s.content))
            .unwrap_or_default();

        result.entries.push(
            PostRecord::new(url, title)
                .with_published_at(entry.published.or(entry.updated))
                .with_author(author)
                .with_summary(fields.summary)
                .with_content_html(fields.content_html)
                .with_image_url(fields.image_url),
        );
    }

    Ok(result)
}

/// Loads the entries currently published at `path`.
///
/// A missing file is a first run; an unreadable or unparseable one is logged
/// and treated the same way, so the job can always rebuild the feed.
pub fn load_published(path: &Path) -> FeedEntryList {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No published feed yet");
            return FeedEntryList::empty();
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read published feed, starting empty");
            return FeedEntryList::empty();
        }
    };

    match parse_feed(&bytes) {
        Ok(ParseResult { entries, skipped }) => {
            if skipped > 0 {
                tracing::warn!(
                    path = %path.display(),
                    skipped = skipped,
                    "Published feed items without guid or link skipped"
                );
            }
            tracing::debug!(path = %path.display(), entries = entries.len(), "Loaded published feed");
            FeedEntryList::from_sorted(entries)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Published feed is unparseable, starting empty");
            FeedEntryList::empty()
        }
    }
}

/// The author as written, whether it came from an RSS `<author>` or an
/// Atom `<author><name>`.
fn author_name(person: &Person) -> Option<String> {
    let name = clean_text(&person.name);
    let email = person
        .email
        .as_deref()
        .map(clean_text)
        .filter(|e| !e.is_empty());

    if name.is_empty() || (name == RSS_AUTHOR_ROLE && email.is_some()) {
        email
    } else {
        Some(name)
    }
}

/// Item fields folded into description HTML by the publisher.
#[derive(Debug, Default, PartialEq, Eq)]
struct DescriptionFields {
    image_url: Option<String>,
    summary: Option<String>,
    content_html: Option<String>,
}

/// Recovers the fields written by [`super::rss::item_description`].
///
/// When the article body is present the summary was not written, so it stays
/// `None`.
fn description_fields(html: &str) -> DescriptionFields {
    let fragment = Html::parse_fragment(html);

    let image_url = Selector::parse("img[src]").ok().and_then(|sel| {
        fragment
            .select(&sel)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(|src| src.trim().to_owned())
            .filter(|src| !src.is_empty())
    });

    let content_html = Selector::parse(&format!("{CONTENT_TAG}.{CONTENT_CLASS} p"))
        .ok()
        .and_then(|sel| {
            let paragraphs: Vec<String> = fragment.select(&sel).map(text_of).collect();
            paragraphs_html(&paragraphs)
        });
    if content_html.is_some() {
        return DescriptionFields {
            image_url,
            summary: None,
            content_html,
        };
    }

    let summary = Selector::parse("p")
        .ok()
        .and_then(|sel| fragment.select(&sel).map(text_of).find(|text| !text.is_empty()))
        .or_else(|| {
            let text = clean_text(&fragment.root_element().text().collect::<String>());
            (!text.is_empty()).then_some(text)
        });

    DescriptionFields {
        image_url,
        summary,
        content_html: None,
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}
