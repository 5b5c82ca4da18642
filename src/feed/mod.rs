//! Feed synthesis: the data model, the merge that produces the next entry
//! list, and reading/writing the published RSS 2.0 document.
//!
//! - [`model`] - [`PostRecord`] and the invariant-carrying [`FeedEntryList`]
//! - [`merge`] - combines published entries with this run's extractions
//! - [`parser`] - reads the previously published document back via `feed-rs`
//! - [`rss`] - renders and atomically writes RSS 2.0 via `quick-xml`

mod merge;
mod model;
mod parser;
mod rss;

pub use merge::{merge_entries, FeedMerger};
pub use model::{FeedEntryList, PostRecord, UNTITLED};
pub use parser::{load_published, parse_feed, ParseResult};
pub use rss::{item_description, paragraphs_html, same_content, ChannelInfo, FeedPublisher, PublishError, PublishOutcome};
