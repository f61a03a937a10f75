//! Facilities for discovering input files and loading text corpora.
//!
//! The core only ever consumes plain text. Line-delimited JSON corpora carry extra
//! per-document metadata which is parsed for callers that want it and otherwise ignored.

use std::collections::BTreeMap;
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::config::{CorpusFormat, IngestConfig};
use crate::error::{DbpeError, Result};

/// Discovers files rooted at the provided input paths according to the ingest configuration.
///
/// Directories are traversed recursively by default; set [`IngestConfig::recursive`] to `false`
/// to limit discovery to the first level.  Files found inside directories must pass the
/// extension filter, while files named explicitly are always kept.  Results are sorted by
/// file name within each directory so training input is reproducible.
pub fn collect_paths<P: AsRef<Path>>(inputs: &[P], cfg: &IngestConfig) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let path = input.as_ref();
        if !path.exists() {
            return Err(DbpeError::InvalidConfig(format!(
                "input path {path:?} does not exist"
            )));
        }
        let metadata = path
            .metadata()
            .map_err(|err| DbpeError::io(err, Some(path.to_path_buf())))?;
        if metadata.is_file() {
            files.push(path.to_path_buf());
            continue;
        }
        if !metadata.is_dir() {
            continue;
        }

        let walker = WalkDir::new(path)
            .follow_links(cfg.follow_symlinks)
            .max_depth(if cfg.recursive { usize::MAX } else { 1 })
            .sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(|err| DbpeError::Internal(err.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let extension = entry.path().extension().and_then(|ext| ext.to_str());
            if cfg.accepts_extension(extension) {
                files.push(entry.into_path());
            } else {
                debug!("skipping {:?}: extension filtered", entry.path());
            }
        }
    }
    if files.is_empty() {
        return Err(DbpeError::InvalidConfig(
            "no files discovered in provided inputs".into(),
        ));
    }
    Ok(files)
}

fn read_utf8(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|err| DbpeError::io(err, Some(path.to_path_buf())))?;
    String::from_utf8(bytes).map_err(|_| DbpeError::InvalidUtf8 {
        path: path.to_path_buf(),
    })
}

/// Loads every discovered file as UTF-8 text and joins the results with newlines.
///
/// With [`CorpusFormat::JsonLines`] each file contributes the text of its documents, one
/// document per line.  A file that is not valid UTF-8 aborts loading with
/// [`DbpeError::InvalidUtf8`].
pub fn load_text_corpus<P: AsRef<Path>>(inputs: &[P], cfg: &IngestConfig) -> Result<String> {
    let file_paths = collect_paths(inputs, cfg)?;
    let mut texts = Vec::with_capacity(file_paths.len());
    for file_path in &file_paths {
        let text = read_utf8(file_path)?;
        match cfg.format {
            CorpusFormat::PlainText => texts.push(text),
            CorpusFormat::JsonLines => {
                let documents = parse_documents(text.as_bytes()).map_err(|err| match err {
                    DbpeError::Serialization(msg) => {
                        DbpeError::Serialization(format!("{}: {msg}", file_path.display()))
                    }
                    other => other,
                })?;
                debug!("{:?}: {} documents", file_path, documents.len());
                texts.extend(documents.into_iter().map(|doc| doc.content));
            }
        }
    }
    Ok(texts.join("\n"))
}

/// Reads an evaluation corpus: one entry per line, trimmed, with blank lines dropped.
pub fn read_corpus_lines<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let text = read_utf8(path.as_ref())?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// A record of a line-delimited JSON corpus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Document text; read from `content` or, failing that, `text`.
    #[serde(alias = "text")]
    pub content: String,
    /// Optional annotations supplied by the corpus provider.
    #[serde(default)]
    pub metadata: Option<DocumentMetadata>,
    /// Raw crawl headers, kept verbatim.
    #[serde(default)]
    pub warc_headers: Option<BTreeMap<String, serde_json::Value>>,
}

/// Provider annotations attached to a [`Document`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    /// Document-level language identification.
    #[serde(default)]
    pub identification: Option<Identification>,
    /// Perplexity under a harmful-content language model.
    #[serde(default)]
    pub harmful_pp: Option<f64>,
    /// Content warnings such as `tiny` or `noisy`.
    #[serde(default)]
    pub quality_warnings: Option<Vec<String>>,
    /// Blocklist categories the source URL falls into.
    #[serde(default)]
    pub categories: Option<Vec<String>>,
}

/// Language label with its confidence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Identification {
    /// Language code.
    pub label: String,
    /// Confidence in `[0, 1]`.
    pub prob: f64,
}

/// Parses line-delimited JSON documents, skipping blank lines.
pub fn parse_documents<R: BufRead>(reader: R) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|err| DbpeError::io(err, None))?;
        if line.trim().is_empty() {
            continue;
        }
        let document: Document = serde_json::from_str(&line).map_err(|err| {
            DbpeError::Serialization(format!("document on line {}: {err}", index + 1))
        })?;
        documents.push(document);
    }
    Ok(documents)
}
