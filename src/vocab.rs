//! Word-frequency vocabulary and the pair statistics BPE training runs on.
//!
//! A [`Vocabulary`] maps every distinct corpus word, held as a list of symbols ending in
//! [`END_OF_WORD`], to its occurrence count. Entries keep the order in which their words
//! were first seen so that frequency ties resolve deterministically.

use std::fmt;

use rand::Rng;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DbpeError, Result};
use crate::model::END_OF_WORD;
use crate::word::Word;

/// Entries per parallel work unit when counting pairs or rewriting the vocabulary.
const PARALLEL_CHUNK: usize = 2048;

/// Adjacent symbol pair borrowed from a vocabulary.
pub type PairRef<'a> = (&'a str, &'a str);

/// A single vocabulary entry: a segmented word and its corpus frequency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabEntry {
    word: Word,
    frequency: u64,
}

impl VocabEntry {
    /// Current segmentation of the word.
    #[must_use]
    pub fn symbols(&self) -> &[String] {
        self.word.symbols()
    }

    /// Space-joined key, e.g. `"l o w </w>"`.
    #[must_use]
    pub fn key(&self) -> String {
        self.word.key()
    }

    /// Number of times the word occurs in the corpus.
    #[must_use]
    pub fn frequency(&self) -> u64 {
        self.frequency
    }
}

/// Mapping from segmented words to corpus frequencies.
///
/// Equality compares the mapping only; entry order is ignored.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    entries: Vec<VocabEntry>,
}

/// Result of rewriting a vocabulary with one merge rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Entries that contained the pair at least once.
    pub entries_rewritten: usize,
    /// Total pair occurrences replaced across all entries, unweighted by frequency.
    pub occurrences: usize,
}

impl Vocabulary {
    /// Builds a vocabulary from raw text.
    ///
    /// Words are split on Unicode whitespace only; no casing, normalisation, or
    /// punctuation handling is performed. Line breaks are whitespace like any other.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self::from_lines(std::iter::once(text))
    }

    /// Builds a vocabulary from a sequence of corpus lines.
    #[must_use]
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries: Vec<VocabEntry> = Vec::new();
        let mut index: FxHashMap<String, usize> = FxHashMap::default();
        for line in lines {
            for raw in line.as_ref().split_whitespace() {
                if let Some(&idx) = index.get(raw) {
                    entries[idx].frequency += 1;
                    continue;
                }
                index.insert(raw.to_string(), entries.len());
                entries.push(VocabEntry {
                    word: Word::from_chars(raw),
                    frequency: 1,
                });
            }
        }
        Self { entries }
    }

    /// Builds a vocabulary from serialized `(key, frequency)` entries.
    ///
    /// Keys are space-joined symbol strings. Duplicate or empty keys are rejected.
    pub fn from_entries<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, u64)>,
        S: AsRef<str>,
    {
        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut vocab = Self::default();
        for (key, frequency) in entries {
            let key = key.as_ref();
            let word = Word::parse_key(key).ok_or_else(|| {
                DbpeError::MalformedArtifact(format!(
                    "vocabulary key {key:?} must be symbols separated by single spaces"
                ))
            })?;
            if !seen.insert(key.to_string()) {
                return Err(DbpeError::MalformedArtifact(format!(
                    "duplicate vocabulary key {key:?}"
                )));
            }
            vocab.entries.push(VocabEntry { word, frequency });
        }
        Ok(vocab)
    }

    /// Number of distinct words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the vocabulary holds no words.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in first-seen order.
    #[must_use]
    pub fn entries(&self) -> &[VocabEntry] {
        &self.entries
    }

    /// Looks up the frequency stored under a space-joined key. Linear in the vocabulary size.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|entry| entry.word.key() == key)
            .map(|entry| entry.frequency)
    }

    /// Total number of word occurrences represented by the vocabulary.
    #[must_use]
    pub fn total_frequency(&self) -> u64 {
        self.entries.iter().map(|entry| entry.frequency).sum()
    }

    /// Number of distinct symbols across all entries.
    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.entries
            .iter()
            .flat_map(|entry| entry.symbols().iter().map(String::as_str))
            .collect::<FxHashSet<&str>>()
            .len()
    }

    /// Counts every adjacent symbol pair, weighted by entry frequency.
    ///
    /// Counting runs in parallel over chunks of entries; chunk results are combined in
    /// entry order so the first-seen order of pairs matches a sequential scan.
    #[must_use]
    pub fn pair_stats(&self) -> PairStats<'_> {
        let partials: Vec<PairStats<'_>> = self
            .entries
            .par_chunks(PARALLEL_CHUNK)
            .map(|chunk| {
                let mut local = PairStats::default();
                for entry in chunk {
                    entry
                        .word
                        .for_each_pair(|left, right| local.add((left, right), entry.frequency));
                }
                local
            })
            .collect();

        let mut partials = partials.into_iter();
        let mut stats = partials.next().unwrap_or_default();
        for partial in partials {
            stats.absorb(partial);
        }
        stats
    }

    /// Rewrites every entry, replacing each adjacent `(left, right)` with its concatenation.
    ///
    /// Consumes the vocabulary and returns the rewritten value; frequencies are preserved.
    pub fn merge_pair(mut self, left: &str, right: &str) -> (Self, MergeSummary) {
        let summary = self
            .entries
            .par_chunks_mut(PARALLEL_CHUNK)
            .map(|chunk| {
                let mut local = MergeSummary::default();
                for entry in chunk {
                    let replaced = entry.word.merge_all(left, right);
                    if replaced > 0 {
                        local.entries_rewritten += 1;
                        local.occurrences += replaced;
                    }
                }
                local
            })
            .reduce(MergeSummary::default, |acc, local| MergeSummary {
                entries_rewritten: acc.entries_rewritten + local.entries_rewritten,
                occurrences: acc.occurrences + local.occurrences,
            });
        (self, summary)
    }
}

impl PartialEq for Vocabulary {
    fn eq(&self, other: &Self) -> bool {
        if self.entries.len() != other.entries.len() {
            return false;
        }
        let lookup: FxHashMap<&[String], u64> = other
            .entries
            .iter()
            .map(|entry| (entry.symbols(), entry.frequency))
            .collect();
        self.entries
            .iter()
            .all(|entry| lookup.get(entry.symbols()) == Some(&entry.frequency))
    }
}

impl Eq for Vocabulary {}

impl Serialize for Vocabulary {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.key(), &entry.frequency)?;
        }
        map.end()
    }
}

struct VocabularyVisitor;

impl<'de> Visitor<'de> for VocabularyVisitor {
    type Value = Vocabulary;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object mapping space-joined symbol strings to frequencies")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Vocabulary, A::Error> {
        let mut entries: Vec<(String, u64)> = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, frequency)) = access.next_entry::<String, u64>()? {
            entries.push((key, frequency));
        }
        Vocabulary::from_entries(entries).map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for Vocabulary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(VocabularyVisitor)
    }
}

/// Aggregate pair frequencies for one training step.
///
/// Pairs are kept in first-seen order, which is the tie-break order for
/// [`PairStats::most_frequent`] and the sampling order for [`PairStats::choose_random`].
#[derive(Debug, Clone, Default)]
pub struct PairStats<'a> {
    order: Vec<(PairRef<'a>, u64)>,
    index: FxHashMap<PairRef<'a>, usize>,
}

impl<'a> PairStats<'a> {
    fn add(&mut self, pair: PairRef<'a>, frequency: u64) {
        match self.index.get(&pair) {
            Some(&idx) => self.order[idx].1 += frequency,
            None => {
                self.index.insert(pair, self.order.len());
                self.order.push((pair, frequency));
            }
        }
    }

    fn absorb(&mut self, other: PairStats<'a>) {
        for (pair, frequency) in other.order {
            self.add(pair, frequency);
        }
    }

    /// Number of distinct pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true when no entry has two or more symbols.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Aggregate frequency of a pair, if it occurs.
    #[must_use]
    pub fn get(&self, left: &str, right: &str) -> Option<u64> {
        self.index.get(&(left, right)).map(|&idx| self.order[idx].1)
    }

    /// Pairs with their frequencies in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (PairRef<'a>, u64)> + '_ {
        self.order.iter().copied()
    }

    /// The highest-frequency pair; ties go to the pair seen first.
    #[must_use]
    pub fn most_frequent(&self) -> Option<(PairRef<'a>, u64)> {
        let mut best: Option<(PairRef<'a>, u64)> = None;
        for &(pair, frequency) in &self.order {
            if best.map_or(true, |(_, top)| frequency > top) {
                best = Some((pair, frequency));
            }
        }
        best
    }

    /// A pair drawn uniformly from the distinct pairs, ignoring frequencies.
    pub fn choose_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(PairRef<'a>, u64)> {
        if self.order.is_empty() {
            return None;
        }
        let idx = rng.gen_range(0..self.order.len());
        Some(self.order[idx])
    }
}

/// Returns true when `symbol` carries the end-of-word marker as its suffix.
#[must_use]
pub fn ends_word(symbol: &str) -> bool {
    symbol.ends_with(END_OF_WORD)
}
