use std::io::Cursor;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use quick_xml::escape::escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;

use super::model::{FeedEntryList, PostRecord};
use crate::config::Config;
use crate::util::write_atomic;

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
const MEDIA_NS: &str = "http://search.yahoo.com/mrss/";
const LANGUAGE: &str = "en-us";

pub(crate) const CONTENT_TAG: &str = "div";
pub(crate) const CONTENT_CLASS: &str = "entry-content";

const BUILD_DATE_OPEN: &str = "<lastBuildDate>";
const BUILD_DATE_CLOSE: &str = "</lastBuildDate>";

/// Errors that can occur while rendering or writing the feed.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The XML writer rejected an event.
    #[error("Failed to serialize feed: {0}")]
    Xml(String),

    /// The rendered feed could not be written. The previous file is intact.
    #[error("Failed to write feed to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What [`FeedPublisher::publish`] did with the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// New content was written atomically.
    Written,
    /// The file on disk already had the same content apart from
    /// `lastBuildDate`, so it was left byte-for-byte untouched.
    Unchanged,
}

/// Channel-level metadata for the published document.
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Public URL of the feed itself, emitted as `atom:link rel="self"`.
    pub self_url: String,
}

/// Serializes a [`FeedEntryList`] to RSS 2.0.
///
/// Output is a pure function of the entries, the channel info and the build
/// date, so identical inputs give identical bytes.
#[derive(Debug, Clone)]
pub struct FeedPublisher {
    channel: ChannelInfo,
}

impl FeedPublisher {
    pub fn new(channel: ChannelInfo) -> Self {
        Self { channel }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(ChannelInfo {
            title: config.feed_title.clone(),
            link: config.category_url.clone(),
            description: config.feed_description.clone(),
            self_url: config.resolved_feed_url(),
        })
    }

    /// Renders the complete RSS document.
    pub fn render(
        &self,
        entries: &FeedEntryList,
        build_date: DateTime<Utc>,
    ) -> Result<Vec<u8>, PublishError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_error)?;

        let mut rss = BytesStart::new("rss");
        rss.push_attribute(("version", "2.0"));
        rss.push_attribute(("xmlns:atom", ATOM_NS));
        rss.push_attribute(("xmlns:media", MEDIA_NS));
        writer.write_event(Event::Start(rss)).map_err(xml_error)?;
        writer
            .write_event(Event::Start(BytesStart::new("channel")))
            .map_err(xml_error)?;

        write_text_element(&mut writer, "title", &self.channel.title)?;
        write_text_element(&mut writer, "link", &self.channel.link)?;
        write_text_element(&mut writer, "description", &self.channel.description)?;
        write_text_element(&mut writer, "language", LANGUAGE)?;
        write_text_element(&mut writer, "lastBuildDate", &build_date.to_rfc2822())?;

        let mut self_link = BytesStart::new("atom:link");
        self_link.push_attribute(("href", self.channel.self_url.as_str()));
        self_link.push_attribute(("rel", "self"));
        self_link.push_attribute(("type", "application/rss+xml"));
        writer.write_event(Event::Empty(self_link)).map_err(xml_error)?;

        for entry in entries {
            write_item(&mut writer, entry)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("channel")))
            .map_err(xml_error)?;
        writer
            .write_event(Event::End(BytesEnd::new("rss")))
            .map_err(xml_error)?;

        let mut bytes = writer.into_inner().into_inner();
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Renders and atomically writes the feed to `path`.
    ///
    /// Skips the write when the existing file differs only in
    /// `lastBuildDate`, so an idle run never produces a spurious change.
    pub fn publish(
        &self,
        entries: &FeedEntryList,
        path: &Path,
        build_date: DateTime<Utc>,
    ) -> Result<PublishOutcome, PublishError> {
        let rendered = self.render(entries, build_date)?;

        match std::fs::read(path) {
            Ok(previous) if same_content(&previous, &rendered) => {
                tracing::debug!(path = %path.display(), "Feed content unchanged, skipping write");
                return Ok(PublishOutcome::Unchanged);
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Could not read existing feed for comparison, rewriting"
                );
            }
        }

        write_atomic(path, &rendered).map_err(|source| PublishError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!(path = %path.display(), items = entries.len(), "Wrote feed");
        Ok(PublishOutcome::Written)
    }
}

fn xml_error(e: impl std::fmt::Display) -> PublishError {
    PublishError::Xml(e.to_string())
}

fn write_text_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> Result<(), PublishError> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_error)?;
    Ok(())
}

fn write_item<W: std::io::Write>(
    writer: &mut Writer<W>,
    entry: &PostRecord,
) -> Result<(), PublishError> {
    writer
        .write_event(Event::Start(BytesStart::new("item")))
        .map_err(xml_error)?;

    write_text_element(writer, "title", &entry.title)?;
    write_text_element(writer, "link", entry.url())?;

    let mut guid = BytesStart::new("guid");
    guid.push_attribute(("isPermaLink", "true"));
    writer.write_event(Event::Start(guid)).map_err(xml_error)?;
    writer
        .write_event(Event::Text(BytesText::new(entry.url())))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new("guid")))
        .map_err(xml_error)?;

    if let Some(published) = entry.published_at {
        write_text_element(writer, "pubDate", &published.to_rfc2822())?;
    }
    if let Some(author) = &entry.author {
        write_text_element(writer, "author", author)?;
    }
    write_text_element(writer, "description", &item_description(entry))?;

    if let Some(image) = &entry.image_url {
        let mut media = BytesStart::new("media:content");
        media.push_attribute(("url", image.as_str()));
        media.push_attribute(("medium", "image"));
        writer.write_event(Event::Empty(media)).map_err(xml_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("item")))
        .map_err(xml_error)?;
    Ok(())
}

/// Builds the HTML carried in an item's `<description>`: the image (if any)
/// as its own paragraph, then the article body wrapped in
/// `<div class="entry-content">` when it was extracted, otherwise the summary
/// paragraph.
///
/// The reader recovers `image_url`, `content_html` and `summary` from exactly
/// this shape.
pub fn item_description(entry: &PostRecord) -> String {
    let mut html = String::new();
    if let Some(image) = &entry.image_url {
        html.push_str(&format!(
            r#"<p><img src="{}" alt="{}" /></p>"#,
            escape(image.as_str()),
            escape(entry.title.as_str())
        ));
    }
    if let Some(content) = &entry.content_html {
        html.push_str(&format!(r#"<{CONTENT_TAG} class="{CONTENT_CLASS}">{content}</{CONTENT_TAG}>"#));
    } else if let Some(summary) = &entry.summary {
        html.push_str(&format!("<p>{}</p>", escape(summary.as_str())));
    }
    html
}

/// Renders plain paragraph texts as escaped `<p>` elements.
///
/// Returns `None` when there is nothing to render.
pub fn paragraphs_html<S: AsRef<str>>(paragraphs: &[S]) -> Option<String> {
    let html: String = paragraphs
        .iter()
        .map(AsRef::as_ref)
        .filter(|text| !text.is_empty())
        .map(|text| format!("<p>{}</p>", escape(text)))
        .collect();
    (!html.is_empty()).then_some(html)
}

/// Compares two rendered documents, ignoring the `lastBuildDate` element.
pub fn same_content(a: &[u8], b: &[u8]) -> bool {
    without_build_date(a) == without_build_date(b)
}

fn without_build_date(doc: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(doc);
    let Some(start) = text.find(BUILD_DATE_OPEN) else {
        return doc.to_vec();
    };
    let Some(close) = text[start..].find(BUILD_DATE_CLOSE) else {
        return doc.to_vec();
    };
    let end = start + close + BUILD_DATE_CLOSE.len();

    let mut out = Vec::with_capacity(doc.len());
    out.extend_from_slice(text[..start].as_bytes());
    out.extend_from_slice(text[end..].as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::merge_entries;
    use chrono::TimeZone;

    fn publisher() -> FeedPublisher {
        FeedPublisher::new(ChannelInfo {
            title: "Example - Top Story".into(),
            link: "https://example.com/category/news/top-story/".into(),
            description: "Latest posts".into(),
            self_url: "https://owner.github.io/repo/feed.xml".into(),
        })
    }

    fn build_date(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn sample_entries() -> FeedEntryList {
        let full = PostRecord::new("https://example.com/news/full-story", "Full <Story> & more")
            .with_published_at(Some(build_date(1_771_372_800)))
            .with_author(Some("Reporter".into()))
            .with_summary(Some("A summary with \"quotes\" & <tags>.".into()))
            .with_image_url(Some("https://cdn.example.com/img.jpg?w=1&h=2".into()));
        let bare = PostRecord::new("https://example.com/news/bare", "Bare");
        merge_entries(FeedEntryList::empty(), vec![full, bare], 10)
    }

    fn render_string(entries: &FeedEntryList, secs: i64) -> String {
        String::from_utf8(publisher().render(entries, build_date(secs)).unwrap()).unwrap()
    }

    #[test]
    fn test_render_channel_metadata() {
        let xml = render_string(&FeedEntryList::empty(), 1_771_372_800);
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom" xmlns:media="http://search.yahoo.com/mrss/">"#));
        assert!(xml.contains("<title>Example - Top Story</title>"));
        assert!(xml.contains("<language>en-us</language>"));
        assert!(xml.contains("<lastBuildDate>Wed, 18 Feb 2026 00:00:00 +0000</lastBuildDate>"));
        assert!(xml.contains(
            r#"<atom:link href="https://owner.github.io/repo/feed.xml" rel="self" type="application/rss+xml"/>"#
        ));
        assert!(!xml.contains("<item>"));
    }

    #[test]
    fn test_render_item_fields_and_escaping() {
        let xml = render_string(&sample_entries(), 0);
        assert!(xml.contains("<title>Full &lt;Story&gt; &amp; more</title>"));
        assert!(xml.contains("<link>https://example.com/news/full-story</link>"));
        assert!(xml.contains(r#"<guid isPermaLink="true">https://example.com/news/full-story</guid>"#));
        assert!(xml.contains("<pubDate>Wed, 18 Feb 2026 00:00:00 +0000</pubDate>"));
        assert!(xml.contains("<author>Reporter</author>"));
        assert!(xml.contains(
            r#"<media:content url="https://cdn.example.com/img.jpg?w=1&amp;h=2" medium="image"/>"#
        ));
    }

    #[test]
    fn test_render_omits_absent_optionals() {
        let xml = render_string(&sample_entries(), 0);
        let bare = &xml[xml.find("<title>Bare</title>").unwrap()..];
        let bare_item = &bare[..bare.find("</item>").unwrap()];
        assert!(!bare_item.contains("<pubDate>"));
        assert!(!bare_item.contains("<author>"));
        assert!(!bare_item.contains("media:content"));
        assert!(bare_item.contains("<description></description>"));
    }

    #[test]
    fn test_items_are_in_list_order() {
        let xml = render_string(&sample_entries(), 0);
        let full = xml.find("full-story</link>").unwrap();
        let bare = xml.find("bare</link>").unwrap();
        assert!(full < bare);
    }

    #[test]
    fn test_item_description_shape() {
        let entry = PostRecord::new("https://example.com/a/b", "T & T")
            .with_image_url(Some("https://img.example.com/x.png".into()))
            .with_summary(Some("1 < 2".into()));
        assert_eq!(
            item_description(&entry),
            r#"<p><img src="https://img.example.com/x.png" alt="T &amp; T" /></p><p>1 &lt; 2</p>"#
        );
        assert_eq!(item_description(&PostRecord::new("https://example.com/a/b", "T")), "");
    }

    #[test]
    fn test_item_description_prefers_full_content() {
        let entry = PostRecord::new("https://example.com/news/example", "Example")
            .with_image_url(Some("https://example.com/image.jpg".into()))
            .with_summary(Some("Only a summary".into()))
            .with_content_html(paragraphs_html(&["Paragraph one.", "Paragraph two."]));

        let description = item_description(&entry);
        assert!(description.contains("Paragraph one."));
        assert!(description.contains("Paragraph two."));
        assert!(!description.contains("Only a summary"));
        assert_eq!(
            description,
            r#"<p><img src="https://example.com/image.jpg" alt="Example" /></p><div class="entry-content"><p>Paragraph one.</p><p>Paragraph two.</p></div>"#
        );
    }

    #[test]
    fn test_paragraphs_html_escapes_and_skips_empty() {
        assert_eq!(
            paragraphs_html(&["Fish & chips", "", "a < b"]).as_deref(),
            Some("<p>Fish &amp; chips</p><p>a &lt; b</p>")
        );
        assert_eq!(paragraphs_html::<&str>(&[]), None);
        assert_eq!(paragraphs_html(&[""]), None);
    }

    #[test]
    fn test_render_is_deterministic() {
        let entries = sample_entries();
        assert_eq!(
            publisher().render(&entries, build_date(42)).unwrap(),
            publisher().render(&entries, build_date(42)).unwrap()
        );
    }

    #[test]
    fn test_same_content_ignores_build_date_only() {
        let entries = sample_entries();
        let a = publisher().render(&entries, build_date(1)).unwrap();
        let b = publisher().render(&entries, build_date(999_999)).unwrap();
        assert_ne!(a, b);
        assert!(same_content(&a, &b));

        let other = publisher().render(&FeedEntryList::empty(), build_date(1)).unwrap();
        assert!(!same_content(&a, &other));
    }

    #[test]
    fn test_publish_skips_unchanged_content() {
        let dir = std::env::temp_dir().join(format!("topstory_rss_publish_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("docs").join("feed.xml");
        let entries = sample_entries();

        let first = publisher().publish(&entries, &path, build_date(1)).unwrap();
        assert_eq!(first, PublishOutcome::Written);
        let bytes_after_first = std::fs::read(&path).unwrap();

        let second = publisher().publish(&entries, &path, build_date(2)).unwrap();
        assert_eq!(second, PublishOutcome::Unchanged);
        assert_eq!(std::fs::read(&path).unwrap(), bytes_after_first);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_publish_failure_reports_path() {
        let dir = std::env::temp_dir().join(format!("topstory_rss_publish_err_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("feed.xml");
        std::fs::create_dir_all(path.join("blocker")).unwrap();

        let err = publisher()
            .publish(&sample_entries(), &path, build_date(1))
            .unwrap_err();
        assert!(matches!(err, PublishError::Write { .. }));
        assert!(err.to_string().contains("feed.xml"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
