//! Greedy application of a learned merge table.
//!
//! Words are re-segmented by repeatedly merging the *leftmost* adjacent pair that is a
//! learned rule, regardless of the rule's position in the merge table. This does not
//! replay merges in training order and does not search for the fewest-token
//! segmentation.

use std::sync::OnceLock;

use regex::Regex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::model::{Pair, END_OF_WORD};
use crate::vocab::ends_word;
use crate::word::Word;

const WORD_PATTERN: &str = r"\w+";

fn word_regex() -> &'static Regex {
    static WORD_REGEX: OnceLock<Regex> = OnceLock::new();
    WORD_REGEX.get_or_init(|| Regex::new(WORD_PATTERN).expect("word pattern is valid"))
}

/// Iterates the word-character runs (`\w+`) of `text`; punctuation and whitespace are dropped.
pub fn words(text: &str) -> impl Iterator<Item = &str> {
    word_regex().find_iter(text).map(|m| m.as_str())
}

/// Applies a merge table to words and text.
///
/// Rules are looked up by exact `(left, right)` symbols. When the table lists the same
/// pair more than once, the earliest occurrence defines the rule's rank
/// (first-write-wins); the later duplicates are ignored. Distinct pairs that happen to
/// concatenate to the same string are independent rules.
#[must_use]
#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    rules: FxHashMap<String, FxHashMap<String, usize>>,
    merges: Vec<Pair>,
}

impl Tokenizer {
    /// Builds the rule lookup from a merge table in training order.
    pub fn new(merges: &[Pair]) -> Self {
        let mut rules: FxHashMap<String, FxHashMap<String, usize>> = FxHashMap::default();
        for (rank, (left, right)) in merges.iter().enumerate() {
            rules
                .entry(left.clone())
                .or_default()
                .entry(right.clone())
                .or_insert(rank);
        }
        Self {
            rules,
            merges: merges.to_vec(),
        }
    }

    /// Merge table the tokenizer was built from.
    #[must_use]
    pub fn merges(&self) -> &[Pair] {
        &self.merges
    }

    /// Training-order rank of the rule `(left, right)`, if learned.
    #[must_use]
    pub fn rank(&self, left: &str, right: &str) -> Option<usize> {
        self.rules.get(left)?.get(right).copied()
    }

    fn is_rule(&self, left: &str, right: &str) -> bool {
        self.rank(left, right).is_some()
    }

    /// Segments a single word (no internal whitespace) into subword symbols.
    ///
    /// The trailing end-of-word marker is dropped when it is a separate final symbol,
    /// unless it is the only symbol left, e.g. for the empty word.
    #[must_use]
    pub fn tokenize_word(&self, word: &str) -> Vec<String> {
        let mut word = Word::from_chars(word);
        let mut start = 0usize;
        while let Some(idx) = word.find_pair(start, |left, right| self.is_rule(left, right)) {
            word.merge_at(idx);
            // Pairs left of idx - 1 are unchanged and were already rejected.
            start = idx.saturating_sub(1);
        }

        let mut symbols = word.into_symbols();
        if symbols.len() > 1 && symbols.last().is_some_and(|last| last == END_OF_WORD) {
            symbols.pop();
        }
        symbols
    }

    /// Tokenizes every `\w+` run of `text` and concatenates the results.
    #[must_use]
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        words(text)
            .flat_map(|word| self.tokenize_word(word))
            .collect()
    }

    /// Tokenizes `text` and strips an end-of-word suffix fused into the last symbol of a
    /// word, so every token is a substring of the input.
    #[must_use]
    pub fn surface_tokens(&self, text: &str) -> Vec<String> {
        self.tokenize(text)
            .into_iter()
            .filter_map(|mut token| {
                if ends_word(&token) {
                    token.truncate(token.len() - END_OF_WORD.len());
                }
                (!token.is_empty()).then_some(token)
            })
            .collect()
    }

    /// Word and token counts for `text`.
    #[must_use]
    pub fn stats(&self, text: &str) -> TokenizationStats {
        let mut stats = TokenizationStats::default();
        for word in words(text) {
            stats.words += 1;
            stats.tokens += self.tokenize_word(word).len();
        }
        stats.tokens_per_word = if stats.words == 0 {
            0.0
        } else {
            stats.tokens as f64 / stats.words as f64
        };
        stats
    }
}

/// Compression summary of a tokenized text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenizationStats {
    /// Number of `\w+` words in the text.
    pub words: usize,
    /// Number of tokens produced for those words.
    pub tokens: usize,
    /// `tokens / words`, or `0.0` when the text has no words.
    pub tokens_per_word: f64,
}
