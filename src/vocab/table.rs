//! Aligned token / index / frequency tables.
//!
//! The three maps are only ever mutated together, so every live index maps
//! back to exactly one token.

use std::collections::HashMap;

use super::{OOV_INDEX, PINNED_COUNT};
use crate::{Error, Result};

/// Occurrence count plus the order in which the entry entered the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Frequency {
    count: u64,
    order: u64,
}

/// Bijective token <-> index mapping with per-token frequency counters.
#[derive(Debug, Clone, Default)]
pub struct VocabTable {
    word_to_index: HashMap<String, u32>,
    index_to_word: HashMap<u32, String>,
    counter: HashMap<String, Frequency>,
    next_order: u64,
}

impl VocabTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a pre-supplied label mapping. Counters start at zero and
    /// entries are ordered by index for tie-breaking.
    ///
    /// Labels on the reserved padding / OOV indices and two labels sharing
    /// one index are rejected.
    pub fn from_labels(labels: impl IntoIterator<Item = (String, u32)>) -> Result<Self> {
        let mut labels: Vec<(String, u32)> = labels.into_iter().collect();
        labels.sort_by_key(|(_, index)| *index);

        let mut table = Self::new();
        for (token, index) in labels {
            if index <= OOV_INDEX {
                return Err(Error::Config(format!(
                    "label {token:?} uses reserved index {index}"
                )));
            }
            if let Some(existing) = table.index_to_word.get(&index) {
                return Err(Error::Config(format!(
                    "labels map both {existing:?} and {token:?} to index {index}"
                )));
            }
            table.put(token, index, 0);
        }
        Ok(table)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.word_to_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.word_to_index.is_empty()
    }

    pub fn index_of(&self, token: &str) -> Option<u32> {
        self.word_to_index.get(token).copied()
    }

    pub fn token_of(&self, index: u32) -> Option<&str> {
        self.index_to_word.get(&index).map(String::as_str)
    }

    pub fn frequency_of(&self, token: &str) -> Option<u64> {
        self.counter.get(token).map(|f| f.count)
    }

    /// Highest live index, if any.
    pub fn max_index(&self) -> Option<u32> {
        self.index_to_word.keys().copied().max()
    }

    /// Saturating counter bump for a known token. Returns its index.
    pub fn touch(&mut self, token: &str) -> Option<u32> {
        let index = self.index_of(token)?;
        if let Some(freq) = self.counter.get_mut(token) {
            freq.count = if freq.count >= PINNED_COUNT {
                PINNED_COUNT
            } else {
                freq.count + 1
            };
        }
        Some(index)
    }

    /// Insert a token that is pinned against eviction at the given index.
    pub fn insert_pinned(&mut self, token: String, index: u32) {
        self.put(token, index, PINNED_COUNT);
    }

    /// Insert an unseen token with a count of one at the next free index.
    pub fn insert(&mut self, token: String) -> u32 {
        let index = self.next_index();
        self.put(token, index, 1);
        index
    }

    /// Remove the entry with the smallest count; earliest entry wins ties.
    pub fn evict_min(&mut self) -> Option<(String, u32)> {
        let token = self
            .counter
            .iter()
            .min_by_key(|(_, freq)| **freq)
            .map(|(token, _)| token.clone())?;
        self.counter.remove(&token);
        let index = self.word_to_index.remove(&token)?;
        self.index_to_word.remove(&index);
        Some((token, index))
    }

    /// Iterate over live `(token, index)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.word_to_index.iter().map(|(t, i)| (t.as_str(), *i))
    }

    /// `len + 2`, or the lowest free index from 2 when an eviction left
    /// that slot occupied.
    fn next_index(&self) -> u32 {
        let sequential = (self.len() + 2) as u32;
        if !self.index_to_word.contains_key(&sequential) {
            return sequential;
        }
        (2..)
            .find(|index| !self.index_to_word.contains_key(index))
            .unwrap_or(sequential)
    }

    fn put(&mut self, token: String, index: u32, count: u64) {
        let order = self.next_order;
        self.next_order += 1;
        self.counter.insert(token.clone(), Frequency { count, order });
        self.index_to_word.insert(index, token.clone());
        self.word_to_index.insert(token, index);
    }
}
