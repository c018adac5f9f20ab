//! Merge and conflict resolution across files
//!
//! Collections are folded newest file first. The first collection seeds each
//! key; every later (older) collection is merged into the accumulator with
//! [`merge_entries`].

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::entry::{BibEntry, EntryCollection};

/// How two `year` values are compared when deciding merge priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YearOrder {
    /// Plain string comparison, so `"9"` orders after `"10"`
    #[default]
    Lexicographic,
    /// Compare the leading digits as integers. Falls back to string
    /// comparison when either side does not start with a digit.
    Numeric,
}

impl YearOrder {
    pub fn compare(self, a: &str, b: &str) -> Ordering {
        match self {
            Self::Lexicographic => a.cmp(b),
            Self::Numeric => match (leading_number(a), leading_number(b)) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => a.cmp(b),
            },
        }
    }
}

fn leading_number(s: &str) -> Option<u64> {
    let s = s.trim();
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(s.len(), |(i, _)| i);
    s[..end].parse().ok()
}

/// Whether `incoming` wins conflicting fields over `existing`.
///
/// Incoming has priority when both have a year and incoming's is greater, or
/// when only incoming has a year.
pub fn incoming_has_priority(existing: &BibEntry, incoming: &BibEntry, order: YearOrder) -> bool {
    match (existing.year(), incoming.year()) {
        (Some(old), Some(new)) => order.compare(new, old) == Ordering::Greater,
        (None, Some(_)) => true,
        _ => false,
    }
}

/// Merge two entries sharing a key.
///
/// Fields missing from `existing` are appended; shared fields (and the entry
/// type) take incoming's value only when incoming has priority.
pub fn merge_entries(existing: &BibEntry, incoming: &BibEntry, order: YearOrder) -> BibEntry {
    merge_entries_counted(existing, incoming, order).0
}

/// [`merge_entries`], also returning how many existing values were replaced
fn merge_entries_counted(
    existing: &BibEntry,
    incoming: &BibEntry,
    order: YearOrder,
) -> (BibEntry, usize) {
    let prioritize_incoming = incoming_has_priority(existing, incoming, order);
    let mut merged = existing.clone();
    let mut overridden = 0;

    if prioritize_incoming {
        merged.entry_type = incoming.entry_type.clone();
    }

    for field in &incoming.fields {
        match merged.get_field(&field.key) {
            None => merged.set_field(field.key.clone(), field.value.clone()),
            Some(current) if prioritize_incoming => {
                if current != field.value {
                    overridden += 1;
                }
                merged.set_field(field.key.clone(), field.value.clone());
            }
            Some(_) => {}
        }
    }

    (merged, overridden)
}

/// Fold collections left to right with a pairwise entry merge.
///
/// Keys seen for the first time are appended unchanged; a key already in the
/// accumulator is replaced by `merge(existing, incoming)` in place.
pub fn merge_collections<I, F>(collections: I, mut merge: F) -> EntryCollection
where
    I: IntoIterator<Item = EntryCollection>,
    F: FnMut(&BibEntry, &BibEntry) -> BibEntry,
{
    let mut merged = EntryCollection::new();
    for collection in collections {
        for (key, entry) in collection {
            match merged.get_mut(&key) {
                Some(existing) => *existing = merge(existing, &entry),
                None => {
                    merged.insert(key, entry);
                }
            }
        }
    }
    merged
}

/// Counters collected while merging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Entries read across all collections
    pub entries_seen: usize,
    /// Times a key was found in more than one collection
    pub keys_merged: usize,
    /// Shared field values replaced by a higher-priority entry
    pub fields_overridden: usize,
}

/// Stateful merger that applies the pairwise rule and keeps [`MergeStats`]
#[derive(Debug, Clone, Default)]
pub struct Merger {
    year_order: YearOrder,
    stats: MergeStats,
}

impl Merger {
    pub fn new(year_order: YearOrder) -> Self {
        Self {
            year_order,
            stats: MergeStats::default(),
        }
    }

    pub fn stats(&self) -> MergeStats {
        self.stats
    }

    /// Merge two entries sharing a key, updating the counters
    pub fn merge_pair(&mut self, existing: &BibEntry, incoming: &BibEntry) -> BibEntry {
        let (merged, overridden) = merge_entries_counted(existing, incoming, self.year_order);
        self.stats.keys_merged += 1;
        self.stats.fields_overridden += overridden;
        merged
    }

    /// Merge collections ordered newest first
    pub fn merge_all<I>(&mut self, collections: I) -> EntryCollection
    where
        I: IntoIterator<Item = EntryCollection>,
    {
        let mut seen = 0;
        let collections = collections.into_iter().inspect(|c| seen += c.len());
        let merged = merge_collections(collections, |existing, incoming| {
            self.merge_pair(existing, incoming)
        });
        self.stats.entries_seen += seen;
        merged
    }
}
