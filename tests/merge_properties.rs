//! Property tests for the feed merge: uniqueness, bound, ordering and
//! idempotence over arbitrary inputs.

use std::collections::HashSet;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use topstory_rss::feed::{merge_entries, FeedEntryList, PostRecord};

/// Small url and date spaces so duplicates and ties actually occur.
fn post() -> impl Strategy<Value = PostRecord> {
    (0u8..12, proptest::option::of(0i64..6)).prop_map(|(slug, day)| {
        PostRecord::new(format!("https://example.com/news/post-{slug}"), format!("Post {slug}"))
            .with_published_at(day.map(|d| Utc.timestamp_opt(1_771_372_800 + d * 86_400, 0).unwrap()))
    })
}

fn posts(max: usize) -> impl Strategy<Value = Vec<PostRecord>> {
    proptest::collection::vec(post(), 0..max)
}

fn is_feed_ordered(list: &FeedEntryList) -> bool {
    list.as_slice().windows(2).all(|pair| match (pair[0].published_at, pair[1].published_at) {
        (Some(a), Some(b)) => a >= b,
        (Some(_), None) | (None, None) => true,
        (None, Some(_)) => false,
    })
}

proptest! {
    #[test]
    fn merged_urls_are_unique(existing in posts(15), new in posts(15), limit in 1usize..20) {
        let existing = merge_entries(FeedEntryList::empty(), existing, 40);
        let merged = merge_entries(existing, new, limit);

        let urls: HashSet<&str> = merged.iter().map(|e| e.url()).collect();
        prop_assert_eq!(urls.len(), merged.len());
    }

    #[test]
    fn merged_length_is_bounded(existing in posts(15), new in posts(15), limit in 1usize..20) {
        let existing = merge_entries(FeedEntryList::empty(), existing, 40);
        let candidates: HashSet<String> = existing
            .iter()
            .chain(new.iter())
            .map(|e| e.url().to_owned())
            .collect();

        let merged = merge_entries(existing, new, limit);
        prop_assert_eq!(merged.len(), limit.min(candidates.len()));
    }

    #[test]
    fn merged_entries_are_newest_first(existing in posts(15), new in posts(15), limit in 1usize..20) {
        let existing = merge_entries(FeedEntryList::empty(), existing, 40);
        let merged = merge_entries(existing, new, limit);
        prop_assert!(is_feed_ordered(&merged));
    }

    #[test]
    fn merging_nothing_new_is_identity(existing in posts(15), limit in 1usize..20) {
        let published = merge_entries(FeedEntryList::empty(), existing, limit);
        let again = merge_entries(published.clone(), Vec::new(), limit);
        prop_assert_eq!(again, published);
    }

    #[test]
    fn newly_extracted_fields_win(existing in posts(15), new in posts(15)) {
        let existing = merge_entries(FeedEntryList::empty(), existing, 40);
        let refreshed: Vec<PostRecord> = new
            .into_iter()
            .map(|p| p.with_summary(Some("fresh".to_string())))
            .collect();
        let refreshed_urls: HashSet<String> = refreshed.iter().map(|p| p.url().to_owned()).collect();

        let merged = merge_entries(existing, refreshed, 40);
        for entry in &merged {
            if refreshed_urls.contains(entry.url()) {
                prop_assert_eq!(entry.summary.as_deref(), Some("fresh"));
            }
        }
    }
}
