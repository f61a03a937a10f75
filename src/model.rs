//! Model types and helpers for working with trained BPE tokenizers.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::serialization::{load_artifact, save_artifact, save_merges_txt, to_artifact_json};
use crate::tokenizer::Tokenizer;
use crate::vocab::Vocabulary;

/// Reserved symbol appended to every word so merges can learn suffixes.
pub const END_OF_WORD: &str = "</w>";

/// Merge rule encoded as `(left, right)` symbols.
pub type Pair = (String, String);

/// Trained BPE model: the ordered merge table plus the final merged vocabulary.
///
/// This is the tokenizer artifact exchanged between training and application. Its JSON
/// form is `{"merges": [[left, right], ...], "vocab": {"s y m </w>": count, ...}}`.
#[must_use]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BpeModel {
    merges: Vec<Pair>,
    vocab: Vocabulary,
}

impl BpeModel {
    /// Constructs a model from a merge table in training order and its final vocabulary.
    pub fn new(merges: Vec<Pair>, vocab: Vocabulary) -> Self {
        Self { merges, vocab }
    }

    /// Returns the merge table in training order.
    #[must_use]
    pub fn merges(&self) -> &[Pair] {
        &self.merges
    }

    /// Returns the vocabulary snapshot taken when training finished.
    #[must_use]
    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Builds a [`Tokenizer`] that applies this model's merges.
    pub fn tokenizer(&self) -> Tokenizer {
        Tokenizer::new(&self.merges)
    }

    /// Persists the model as a JSON artifact.
    pub fn save<P: AsRef<Path>>(&self, path: P, pretty: bool) -> Result<()> {
        save_artifact(self, path, pretty)
    }

    /// Serialises the model to a JSON string.
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        to_artifact_json(self, pretty)
    }

    /// Loads a model previously written with [`BpeModel::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_artifact(path)
    }

    /// Writes the human-readable `merges.txt` export.
    pub fn save_merges_txt<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_merges_txt(&self.merges, path)
    }

    /// Creates a derived model keeping only the first `count` merges.
    ///
    /// The vocabulary snapshot is kept unchanged; it records the corpus as seen by the
    /// full training run.
    pub fn truncate_merges(&self, count: usize) -> Self {
        let keep = count.min(self.merges.len());
        Self::new(self.merges[..keep].to_vec(), self.vocab.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> BpeModel {
        let vocab = Vocabulary::from_entries([("lo w </w>", 5), ("lo w e r </w>", 2)]).unwrap();
        BpeModel::new(
            vec![("l".into(), "o".into()), ("lo".into(), "w".into())],
            vocab,
        )
    }

    #[test]
    fn json_layout_matches_artifact_format() {
        let json = sample_model().to_json(false).expect("serialize");
        assert_eq!(
            json,
            r#"{"merges":[["l","o"],["lo","w"]],"vocab":{"lo w </w>":5,"lo w e r </w>":2}}"#
        );
    }

    #[test]
    fn truncate_merges_preserves_order() {
        let model = sample_model();
        let trimmed = model.truncate_merges(1);
        assert_eq!(trimmed.merges(), &[("l".to_string(), "o".to_string())]);
        assert_eq!(trimmed.vocab(), model.vocab());
        assert_eq!(model.truncate_merges(10).merges().len(), 2);
    }

    #[test]
    fn tokenizer_uses_model_merges() {
        let tokens = sample_model().tokenizer().tokenize_word("low");
        assert_eq!(tokens, vec!["low".to_string()]);
    }
}
