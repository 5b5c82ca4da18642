//! Feed merging: the previously published entries plus this run's
//! extractions become the next published list.
//!
//! Ordering rule, applied as one comparator so the result is total and
//! deterministic:
//!
//! 1. `published_at` descending; entries without a date after every dated one
//! 2. discovery rank ascending: this run's extractions in discovery order
//!    (newest listing page first), then the previously published entries in
//!    their published order
//! 3. `url` lexical order
//!
//! Because previously published entries keep their relative order through
//! rule 2, merging a list with nothing new reproduces it exactly.

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::num::NonZeroUsize;

use super::model::{FeedEntryList, PostRecord};
use crate::config::Config;

/// Merges extraction results into the published entry list.
#[derive(Debug, Clone, Copy)]
pub struct FeedMerger {
    recent_to_include: NonZeroUsize,
}

struct Slot {
    rank: usize,
    record: PostRecord,
}

impl FeedMerger {
    pub fn new(recent_to_include: NonZeroUsize) -> Self {
        Self { recent_to_include }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.recent_limit())
    }

    pub fn limit(&self) -> usize {
        self.recent_to_include.get()
    }

    /// Combines `existing` (the currently published entries, in published
    /// order) with `newly_extracted` (this run's successful extractions, in
    /// discovery order).
    ///
    /// A newly extracted record replaces an existing entry with the same url
    /// and takes over its position in the discovery ranking. Duplicate urls
    /// within `existing` keep the first occurrence; duplicates within
    /// `newly_extracted` keep the latest fields at the earliest rank.
    pub fn merge(&self, existing: FeedEntryList, newly_extracted: Vec<PostRecord>) -> FeedEntryList {
        let offset = newly_extracted.len();
        let mut slots: HashMap<String, Slot> = HashMap::with_capacity(existing.len() + offset);

        for (position, record) in existing.into_vec().into_iter().enumerate() {
            slots
                .entry(record.url().to_owned())
                .or_insert(Slot { rank: offset + position, record });
        }

        let mut replaced = 0usize;
        for (rank, record) in newly_extracted.into_iter().enumerate() {
            match slots.entry(record.url().to_owned()) {
                Entry::Occupied(mut occupied) => {
                    let slot = occupied.get_mut();
                    if slot.rank >= offset {
                        replaced += 1;
                        slot.rank = rank;
                    }
                    slot.record = record;
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(Slot { rank, record });
                }
            }
        }

        let mut merged: Vec<Slot> = slots.into_values().collect();
        merged.sort_by(feed_order);

        let candidates = merged.len();
        merged.truncate(self.limit());

        tracing::debug!(
            candidates = candidates,
            replaced = replaced,
            kept = merged.len(),
            limit = self.limit(),
            "Merged feed entries"
        );

        FeedEntryList::from_sorted(merged.into_iter().map(|slot| slot.record).collect())
    }
}

fn feed_order(a: &Slot, b: &Slot) -> Ordering {
    let by_date = match (a.record.published_at, b.record.published_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_date
        .then(a.rank.cmp(&b.rank))
        .then_with(|| a.record.url().cmp(b.record.url()))
}

/// Convenience wrapper for callers that only have a plain limit.
///
/// A limit of zero is treated as one, matching the job's refusal to publish
/// an empty feed over a populated one.
pub fn merge_entries(
    existing: FeedEntryList,
    newly_extracted: Vec<PostRecord>,
    recent_to_include: usize,
) -> FeedEntryList {
    let limit = NonZeroUsize::new(recent_to_include).unwrap_or(NonZeroUsize::MIN);
    FeedMerger::new(limit).merge(existing, newly_extracted)
}
