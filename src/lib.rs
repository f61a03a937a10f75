//! Defended byte pair encoding (BPE) training library and CLI.
//!
//! The crate exposes both a library API and a `dbpe` command line interface for
//! training word-level BPE tokenizers whose merge tables are harder to predict: every
//! `(k + 1)`-th merge step picks a random adjacent pair instead of the most frequent
//! one.  Typical usage loads a text corpus, trains a `BpeModel`, persists the
//! `{merges, vocab}` artifact, and compares the learned segmentation against a
//! reference tokenizer with boundary precision/recall/F1.
//!
//! ```no_run
//! use dbpe::{EvalConfig, Evaluator, IngestConfig, Trainer, TrainerConfig, WordCharacters};
//!
//! # fn main() -> dbpe::Result<()> {
//! let trainer_cfg = TrainerConfig::builder()
//!     .num_merges(2000)
//!     .defense_interval(Some(10))
//!     .seed(Some(7))
//!     .show_progress(false)
//!     .build()?;
//! let trainer = Trainer::new(trainer_cfg);
//! let artifacts = trainer.train_from_paths(&["/path/to/corpus"], &IngestConfig::default())?;
//! artifacts.model.save("out/tokenizer.json", false)?;
//!
//! let tokenizer = artifacts.model.tokenizer();
//! let lines = dbpe::corpus::read_corpus_lines("/path/to/eval.txt")?;
//! let report = Evaluator::new(EvalConfig::default()).evaluate(&lines, &tokenizer, &WordCharacters)?;
//! println!("F1 = {:.3}", report.f1);
//! # Ok(())
//! # }
//! ```
//!
//! The CLI is enabled by default through the `cli` feature.  Users targeting the
//! library portion only can disable default features to avoid the CLI
//! dependencies: `dbpe = { version = "...", default-features = false }`.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    clippy::all,
    rust_2018_idioms,
    future_incompatible,
    unused_lifetimes,
    unreachable_pub
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::multiple_crate_versions,
    clippy::cast_precision_loss
)]

pub mod config;
pub mod corpus;
pub mod error;
pub mod evaluate;
pub mod metrics;
pub mod model;
pub mod segmenter;
pub mod serialization;
pub mod tokenizer;
pub mod trainer;
pub mod vocab;
mod word;

pub use config::{CorpusFormat, EvalConfig, IngestConfig, TrainerBuilder, TrainerConfig};
pub use error::{DbpeError, Result};
pub use evaluate::{boundary_vector, BoundaryScores, EvaluationReport, Evaluator};
pub use metrics::{IterationMetrics, SelectionPolicy, StopReason, TrainingMetrics};
pub use model::{BpeModel, Pair, END_OF_WORD};
pub use segmenter::{load_segmenter, HuggingFaceSegmenter, Segmenter, Whitespace, WordCharacters};
pub use tokenizer::{TokenizationStats, Tokenizer};
pub use trainer::{merge_step, StepOutcome, Trainer, TrainerArtifacts};
pub use vocab::{PairStats, Vocabulary};
