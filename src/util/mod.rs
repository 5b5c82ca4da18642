//! Utility functions shared by the scraper and the publisher.
//!
//! - **Text cleanup**: control-character stripping and whitespace collapsing
//!   for scraped strings
//! - **URL normalization**: canonical post-URL form used as the identity key
//! - **Atomic writes**: temp-file-then-rename persistence for both artifacts

mod atomic;
mod text;
mod url_norm;

pub use atomic::write_atomic;
pub use text::{clean_text, collapse_whitespace, strip_control_chars, truncate_chars};
pub use url_norm::{normalize_post_url, resolve_href};
