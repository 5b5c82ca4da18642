use chrono::{DateTime, Utc};

/// Placeholder title used when a post page yields no usable title.
pub const UNTITLED: &str = "Untitled";

/// One discovered and extracted post.
///
/// `url` is the identity key across the whole system: seen-state membership,
/// feed uniqueness and merge replacement are all decided by it. The remaining
/// fields only ever come from an extraction (or from reading back a feed we
/// published earlier), never from defaults invented at merge time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    url: String,
    pub title: String,
    /// Second precision, so a value survives an RFC 2822 round trip unchanged.
    pub published_at: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub summary: Option<String>,
    /// Full article body as escaped `<p>` paragraphs.
    pub content_html: Option<String>,
    pub image_url: Option<String>,
}

impl PostRecord {
    /// Creates a record with only the required fields set.
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            published_at: None,
            author: None,
            summary: None,
            content_html: None,
            image_url: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn with_published_at(mut self, published_at: Option<DateTime<Utc>>) -> Self {
        self.published_at = published_at.map(truncate_to_seconds);
        self
    }

    pub fn with_author(mut self, author: Option<String>) -> Self {
        self.author = author.filter(|a| !a.is_empty());
        self
    }

    pub fn with_summary(mut self, summary: Option<String>) -> Self {
        self.summary = summary.filter(|s| !s.is_empty());
        self
    }

    pub fn with_content_html(mut self, content_html: Option<String>) -> Self {
        self.content_html = content_html.filter(|c| !c.is_empty());
        self
    }

    pub fn with_image_url(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url.filter(|i| !i.is_empty());
        self
    }
}

fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(dt.timestamp(), 0).unwrap_or(dt)
}

/// The ordered, deduplicated, bounded list of entries that gets published.
///
/// Built by [`crate::feed::FeedMerger`], which establishes the uniqueness,
/// ordering and bound invariants. A list read back from disk is taken in
/// document order and only ever reaches the publisher through a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntryList {
    entries: Vec<PostRecord>,
}

impl FeedEntryList {
    pub(crate) fn from_sorted(entries: Vec<PostRecord>) -> Self {
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PostRecord> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[PostRecord] {
        &self.entries
    }

    pub fn into_vec(self) -> Vec<PostRecord> {
        self.entries
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.entries.iter().any(|e| e.url() == url)
    }
}

impl<'a> IntoIterator for &'a FeedEntryList {
    type Item = &'a PostRecord;
    type IntoIter = std::slice::Iter<'a, PostRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
