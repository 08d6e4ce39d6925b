//! Session summaries.
//!
//! A [`Summary`] maps a kind identifier (`"ItemA"`, ...) to the set of
//! summary texts of items of that kind revealed so far. The server keeps the
//! authoritative copy in a [`SummaryBuilder`]; the client builds its own from
//! what it received and submits it for comparison.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::item::Item;

/// Immutable digest of revealed items.
///
/// Equality is deep: same keys, same member set per key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Summary(BTreeMap<String, BTreeSet<String>>);

impl Summary {
    /// Empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Texts recorded under `kind`.
    pub fn get(&self, kind: &str) -> Option<&BTreeSet<String>> {
        self.0.get(kind)
    }

    /// Record `text` under `kind`, creating the entry if needed.
    pub fn insert(&mut self, kind: impl Into<String>, text: impl Into<String>) {
        self.0.entry(kind.into()).or_default().insert(text.into());
    }

    /// Drop a whole kind entry.
    pub fn remove(&mut self, kind: &str) -> Option<BTreeSet<String>> {
        self.0.remove(kind)
    }

    /// Number of kind entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no kind has been recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.0.iter().map(|(kind, texts)| (kind.as_str(), texts))
    }

    /// Total number of recorded texts across all kinds.
    pub fn text_count(&self) -> usize {
        self.0.values().map(BTreeSet::len).sum()
    }
}

impl From<BTreeMap<String, BTreeSet<String>>> for Summary {
    fn from(entries: BTreeMap<String, BTreeSet<String>>) -> Self {
        Self(entries)
    }
}

impl From<Summary> for BTreeMap<String, BTreeSet<String>> {
    fn from(summary: Summary) -> Self {
        summary.0
    }
}

impl FromIterator<(String, BTreeSet<String>)> for Summary {
    fn from_iter<T: IntoIterator<Item = (String, BTreeSet<String>)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Running summary accumulator.
///
/// Only grows: there is no removal. Both peers must fold with [`Self::add`]
/// for their summaries to compare equal.
#[derive(Debug, Clone, Default)]
pub struct SummaryBuilder {
    summary: Summary,
    folded: u64,
}

impl SummaryBuilder {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one item into the entry for its kind.
    pub fn add(&mut self, item: &Item) {
        self.summary.insert(item.kind().as_str(), item.summary_text());
        self.folded += 1;
    }

    /// Fold every item of `items`.
    pub fn extend<'a>(&mut self, items: impl IntoIterator<Item = &'a Item>) {
        for item in items {
            self.add(item);
        }
    }

    /// Copy of the current digest.
    pub fn snapshot(&self) -> Summary {
        self.summary.clone()
    }

    /// Number of items folded so far, duplicates included.
    pub fn folded(&self) -> u64 {
        self.folded
    }
}
