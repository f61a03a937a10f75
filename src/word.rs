use crate::model::END_OF_WORD;

/// Symbol-list representation of a single word.
///
/// All pair matching happens on list elements, never on the joined string, so a symbol
/// boundary can not accidentally reproduce another pair's concatenation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub(crate) struct Word {
    symbols: Vec<String>,
}

impl Word {
    /// Splits `word` into characters and appends the end-of-word marker.
    pub(crate) fn from_chars(word: &str) -> Self {
        let mut symbols: Vec<String> = word.chars().map(String::from).collect();
        symbols.push(END_OF_WORD.to_string());
        Self { symbols }
    }

    /// Wraps an already segmented symbol list.
    #[cfg(test)]
    pub(crate) fn from_symbols(symbols: Vec<String>) -> Self {
        Self { symbols }
    }

    /// Parses a space-joined vocabulary key. Returns `None` for empty segments.
    pub(crate) fn parse_key(key: &str) -> Option<Self> {
        let symbols = key
            .split(' ')
            .map(|symbol| (!symbol.is_empty()).then(|| symbol.to_string()))
            .collect::<Option<Vec<_>>>()?;
        Some(Self { symbols })
    }

    /// Joins the symbols with single spaces, the serialized vocabulary key form.
    pub(crate) fn key(&self) -> String {
        self.symbols.join(" ")
    }

    pub(crate) fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub(crate) fn into_symbols(self) -> Vec<String> {
        self.symbols
    }

    /// Returns true when the word contains at least two symbols.
    pub(crate) fn has_pairs(&self) -> bool {
        self.symbols.len() >= 2
    }

    /// Invokes the provided closure for each adjacent symbol pair, left to right.
    pub(crate) fn for_each_pair<'a, F>(&'a self, mut f: F)
    where
        F: FnMut(&'a str, &'a str),
    {
        for window in self.symbols.windows(2) {
            f(window[0].as_str(), window[1].as_str());
        }
    }

    /// Returns the index of the first pair at or after `start` accepted by `is_rule`.
    pub(crate) fn find_pair<F>(&self, start: usize, mut is_rule: F) -> Option<usize>
    where
        F: FnMut(&str, &str) -> bool,
    {
        self.symbols
            .windows(2)
            .enumerate()
            .skip(start)
            .find(|(_, window)| is_rule(window[0].as_str(), window[1].as_str()))
            .map(|(idx, _)| idx)
    }

    /// Replaces the symbols at `idx` and `idx + 1` with their concatenation.
    pub(crate) fn merge_at(&mut self, idx: usize) {
        let right = self.symbols.remove(idx + 1);
        self.symbols[idx].push_str(&right);
    }

    /// Merges every non-overlapping occurrence of `(left, right)`, scanning left to right.
    /// Returns the number of occurrences replaced.
    pub(crate) fn merge_all(&mut self, left: &str, right: &str) -> usize {
        if !self.has_pairs() {
            return 0;
        }

        let mut merged = Vec::with_capacity(self.symbols.len());
        let mut replaced = 0usize;
        let mut iter = std::mem::take(&mut self.symbols).into_iter().peekable();
        while let Some(mut symbol) = iter.next() {
            if symbol == left && iter.peek().is_some_and(|next| next == right) {
                if let Some(next) = iter.next() {
                    symbol.push_str(&next);
                    replaced += 1;
                }
            }
            merged.push(symbol);
        }
        self.symbols = merged;
        replaced
    }
}
