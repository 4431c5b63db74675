//! Frontier and deduplication state for one crawl session
//!
//! All sets hold normalized keys. `discovered` also remembers the first URL
//! seen for each key so the discovery phase fetches a real address.

use crate::url::normalize_key;
use std::collections::{HashMap, HashSet};

/// Session-scoped URL bookkeeping
///
/// Invariants:
/// - `successful` is a subset of `visited`
/// - `existing` only grows during a session
#[derive(Debug, Default)]
pub struct Frontier {
    existing: HashSet<String>,
    visited: HashSet<String>,
    successful: HashSet<String>,
    discovered: HashMap<String, String>,
}

impl Frontier {
    /// Creates a frontier seeded with the keys already stored
    pub fn new(existing: HashSet<String>) -> Self {
        Self {
            existing,
            ..Self::default()
        }
    }

    pub fn existing(&self) -> &HashSet<String> {
        &self.existing
    }

    pub fn visited(&self) -> &HashSet<String> {
        &self.visited
    }

    pub fn is_existing(&self, key: &str) -> bool {
        self.existing.contains(key)
    }

    /// True when a URL's content is already stored or was fetched this session
    pub fn has_content(&self, key: &str) -> bool {
        self.successful.contains(key) || self.existing.contains(key)
    }

    /// Records a fetch attempt
    pub fn mark_visited(&mut self, key: &str) {
        self.visited.insert(key.to_string());
    }

    /// Records a page that yielded content
    pub fn record_success(&mut self, key: &str) {
        self.visited.insert(key.to_string());
        self.successful.insert(key.to_string());
        self.existing.insert(key.to_string());
    }

    /// Merges extracted links into `discovered`, keeping the first URL per key
    ///
    /// Returns how many new keys were added.
    pub fn add_discovered<I>(&mut self, links: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut added = 0;
        for link in links {
            let key = normalize_key(&link);
            if key.is_empty() {
                continue;
            }
            if let std::collections::hash_map::Entry::Vacant(slot) = self.discovered.entry(key) {
                slot.insert(link);
                added += 1;
            }
        }
        added
    }

    pub fn discovered_len(&self) -> usize {
        self.discovered.len()
    }

    pub fn has_discovered(&self) -> bool {
        !self.discovered.is_empty()
    }

    /// Takes the next discovery pass
    ///
    /// Eligible URLs are discovered ones whose key is neither successful,
    /// stored, nor in `excluded`. When any are eligible, `discovered` is
    /// cleared and the URLs are returned sorted lexicographically. When none
    /// are, `discovered` is left untouched and the result is empty.
    pub fn take_eligible(&mut self, excluded: &HashSet<String>) -> Vec<String> {
        let mut eligible: Vec<String> = self
            .discovered
            .iter()
            .filter(|(key, _)| {
                !self.successful.contains(*key)
                    && !self.existing.contains(*key)
                    && !excluded.contains(*key)
            })
            .map(|(_, url)| url.clone())
            .collect();

        if eligible.is_empty() {
            return eligible;
        }

        eligible.sort();
        self.discovered.clear();
        eligible
    }
}
