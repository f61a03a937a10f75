//! Tokenizers that can be compared by the evaluator.
//!
//! Anything that maps a line of text to an ordered list of token strings is a
//! [`Segmenter`]: the trained [`Tokenizer`], simple splitters, a Hugging Face
//! `tokenizer.json`, or a plain closure.

use std::fs;
use std::path::Path;

use crate::error::{DbpeError, Result};
use crate::serialization::from_artifact_json;
use crate::tokenizer::{words, Tokenizer};

/// Maps a line of text to its ordered tokens.
pub trait Segmenter: Sync {
    /// Splits `text` into tokens.
    fn segment(&self, text: &str) -> Result<Vec<String>>;
}

impl<F> Segmenter for F
where
    F: Fn(&str) -> Vec<String> + Sync,
{
    fn segment(&self, text: &str) -> Result<Vec<String>> {
        Ok(self(text))
    }
}

/// Emits surface tokens: a fused end-of-word marker is stripped so every token can be
/// located in the input line.
impl Segmenter for Tokenizer {
    fn segment(&self, text: &str) -> Result<Vec<String>> {
        Ok(self.surface_tokens(text))
    }
}

/// Splits on Unicode whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct Whitespace;

impl Segmenter for Whitespace {
    fn segment(&self, text: &str) -> Result<Vec<String>> {
        Ok(text.split_whitespace().map(str::to_string).collect())
    }
}

/// Emits the `\w+` runs of the text, the word split the trained tokenizer applies.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCharacters;

impl Segmenter for WordCharacters {
    fn segment(&self, text: &str) -> Result<Vec<String>> {
        Ok(words(text).map(str::to_string).collect())
    }
}

/// Wraps a Hugging Face tokenizer loaded from `tokenizer.json`.
pub struct HuggingFaceSegmenter {
    inner: tokenizers::Tokenizer,
}

impl HuggingFaceSegmenter {
    /// Parses a serialized Hugging Face tokenizer.
    pub fn from_json(json: &str) -> Result<Self> {
        let inner: tokenizers::Tokenizer = json.parse()?;
        Ok(Self { inner })
    }
}

impl std::fmt::Debug for HuggingFaceSegmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuggingFaceSegmenter").finish_non_exhaustive()
    }
}

impl Segmenter for HuggingFaceSegmenter {
    fn segment(&self, text: &str) -> Result<Vec<String>> {
        let encoding = self.inner.encode(text, false)?;
        Ok(encoding.get_tokens().to_vec())
    }
}

/// Resolves a segmenter description.
///
/// `whitespace` and `words` select the built-in splitters. Anything else is read as a path
/// to either a `{merges, vocab}` artifact or a Hugging Face `tokenizer.json`, told apart by
/// the top-level keys of the document.
pub fn load_segmenter(spec: &str) -> Result<Box<dyn Segmenter>> {
    match spec {
        "whitespace" => return Ok(Box::new(Whitespace)),
        "words" => return Ok(Box::new(WordCharacters)),
        _ => {}
    }

    let path = Path::new(spec);
    let json = fs::read_to_string(path).map_err(|err| DbpeError::io(err, Some(path.into())))?;
    let document: serde_json::Value = serde_json::from_str(&json)?;
    let has = |key: &str| document.get(key).is_some();
    if has("model") {
        Ok(Box::new(HuggingFaceSegmenter::from_json(&json)?))
    } else if has("merges") && has("vocab") {
        Ok(Box::new(from_artifact_json(&json)?.tokenizer()))
    } else {
        Err(DbpeError::MalformedArtifact(format!(
            "{} is neither a dbpe artifact nor a Hugging Face tokenizer",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Pair;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn closures_are_segmenters() {
        let chars = |text: &str| text.chars().map(String::from).collect::<Vec<_>>();
        assert_eq!(chars.segment("ab").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn builtin_splitters() {
        assert_eq!(
            Whitespace.segment(" hello,  world ").unwrap(),
            vec!["hello,", "world"]
        );
        assert_eq!(
            WordCharacters.segment(" hello,  world ").unwrap(),
            vec!["hello", "world"]
        );
    }

    #[test]
    fn trained_tokenizer_emits_surface_tokens() {
        let merges: Vec<Pair> = vec![("l".into(), "o".into()), ("w".into(), "</w>".into())];
        let tok = Tokenizer::new(&merges);
        assert_eq!(tok.segment("low").unwrap(), vec!["lo", "w"]);
    }

    #[test]
    fn load_segmenter_detects_artifacts() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("tokenizer.json");
        fs::write(&path, r#"{"merges":[["l","o"]],"vocab":{"lo w </w>":1}}"#).expect("write");
        let segmenter = load_segmenter(path.to_str().unwrap()).expect("load");
        assert_eq!(segmenter.segment("low").unwrap(), vec!["lo", "w"]);

        let words = load_segmenter("words").expect("words");
        assert_eq!(words.segment("a-b").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn load_segmenter_loads_huggingface_wordlevel() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("hf.json");
        let json = r#"{
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": {"type": "Whitespace"},
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": {"hello": 0, "world": 1, "[UNK]": 2},
                "unk_token": "[UNK]"
            }
        }"#;
        fs::write(&path, json).expect("write");
        let segmenter = load_segmenter(path.to_str().unwrap()).expect("load");
        assert_eq!(
            segmenter.segment("hello world").unwrap(),
            vec!["hello", "world"]
        );
    }

    #[test]
    fn unknown_document_shape_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("other.json");
        fs::write(&path, r#"{"something":"else"}"#).expect("write");
        let Err(err) = load_segmenter(path.to_str().unwrap()) else {
            panic!("document without merges/vocab or model must be rejected");
        };
        assert!(matches!(err, DbpeError::MalformedArtifact(_)));
    }
}
