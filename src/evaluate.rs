//! Boundary-based comparison of two segmentations of the same text.
//!
//! Each tokenization of a line is reduced to a per-character vector marking where tokens
//! start. The candidate's vector is scored against the reference's as binary predictions,
//! and the per-line scores are averaged over the corpus.

use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::EvalConfig;
use crate::error::{DbpeError, Result};
use crate::segmenter::Segmenter;

/// Marks the character offset at which each token of `tokens` starts in `line`.
///
/// Tokens are located left to right, each search starting after the end of the previous
/// match. A token that can not be found (or is empty) leaves no mark and does not move the
/// search position. Offsets count characters, not bytes.
#[must_use]
pub fn boundary_vector<S: AsRef<str>>(line: &str, tokens: &[S]) -> Vec<u8> {
    let mut marks = vec![0u8; line.chars().count()];
    let mut byte_pos = 0usize;
    let mut char_pos = 0usize;
    for token in tokens {
        let token = token.as_ref();
        if token.is_empty() {
            continue;
        }
        let rest = &line[byte_pos..];
        let Some(offset) = rest.find(token) else {
            continue;
        };
        let start = char_pos + rest[..offset].chars().count();
        marks[start] = 1;
        byte_pos += offset + token.len();
        char_pos = start + token.chars().count();
    }
    marks
}

/// Precision, recall and F1 of one comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundaryScores {
    /// Share of candidate boundaries that are reference boundaries.
    pub precision: f64,
    /// Share of reference boundaries the candidate found.
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl BoundaryScores {
    /// Scores `candidate` against `reference`, padding the shorter vector with zeros.
    /// Undefined ratios are 0.
    #[must_use]
    pub fn from_vectors(candidate: &[u8], reference: &[u8]) -> Self {
        let len = candidate.len().max(reference.len());
        let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
        for idx in 0..len {
            let predicted = candidate.get(idx).copied().unwrap_or(0) != 0;
            let actual = reference.get(idx).copied().unwrap_or(0) != 0;
            match (predicted, actual) {
                (true, true) => tp += 1,
                (true, false) => fp += 1,
                (false, true) => fn_ += 1,
                (false, false) => {}
            }
        }
        Self {
            precision: ratio(tp, tp + fp),
            recall: ratio(tp, tp + fn_),
            f1: ratio(2 * tp, 2 * tp + fp + fn_),
        }
    }
}

/// Scores one line.
pub fn score_line<C, R>(line: &str, candidate: &C, reference: &R) -> Result<BoundaryScores>
where
    C: Segmenter + ?Sized,
    R: Segmenter + ?Sized,
{
    let predicted = boundary_vector(line, &candidate.segment(line)?);
    let actual = boundary_vector(line, &reference.segment(line)?);
    Ok(BoundaryScores::from_vectors(&predicted, &actual))
}

/// Corpus-level result: the arithmetic mean of the per-line scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Mean precision.
    pub precision: f64,
    /// Mean recall.
    pub recall: f64,
    /// Mean F1.
    pub f1: f64,
    /// Number of lines scored.
    pub lines: usize,
}

/// Runs boundary evaluations over a corpus of lines.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    cfg: EvalConfig,
}

impl Evaluator {
    /// Creates an evaluator for the supplied configuration.
    #[must_use]
    pub fn new(cfg: EvalConfig) -> Self {
        Self { cfg }
    }

    /// Returns an immutable reference to the underlying configuration.
    #[must_use]
    pub fn config(&self) -> &EvalConfig {
        &self.cfg
    }

    /// Scores `candidate` against `reference` on every line of `corpus`.
    ///
    /// Lines are scored in parallel; the means are summed in corpus order so the report
    /// does not depend on scheduling. An empty corpus reports zeros.
    pub fn evaluate<S, C, R>(
        &self,
        corpus: &[S],
        candidate: &C,
        reference: &R,
    ) -> Result<EvaluationReport>
    where
        S: AsRef<str> + Sync,
        C: Segmenter + ?Sized,
        R: Segmenter + ?Sized,
    {
        let lines: Vec<&str> = corpus
            .iter()
            .map(AsRef::as_ref)
            .filter(|line| !(self.cfg.skip_blank_lines && line.trim().is_empty()))
            .collect();
        if lines.is_empty() {
            return Ok(EvaluationReport::default());
        }

        let progress = self.progress_bar(lines.len() as u64)?;
        let scores = lines
            .par_iter()
            .map(|line| {
                let scores = score_line(line, candidate, reference);
                progress.inc(1);
                scores
            })
            .collect::<Result<Vec<_>>>()?;
        progress.finish_and_clear();

        let count = scores.len() as f64;
        let (precision, recall, f1) = scores.iter().fold((0.0, 0.0, 0.0), |acc, s| {
            (acc.0 + s.precision, acc.1 + s.recall, acc.2 + s.f1)
        });
        let report = EvaluationReport {
            precision: precision / count,
            recall: recall / count,
            f1: f1 / count,
            lines: scores.len(),
        };
        if self.cfg.show_progress {
            info!(
                "evaluated {} lines: precision {:.4} recall {:.4} f1 {:.4}",
                report.lines, report.precision, report.recall, report.f1
            );
        }
        Ok(report)
    }

    fn progress_bar(&self, len: u64) -> Result<ProgressBar> {
        if !self.cfg.show_progress {
            return Ok(ProgressBar::hidden());
        }
        let style = ProgressStyle::with_template(
            "{spinner} evaluating [{bar:40}] {pos}/{len} lines {elapsed}",
        )
        .map_err(|err| DbpeError::Internal(err.to_string()))?
        .progress_chars("=> ");
        let pb = ProgressBar::new(len);
        pb.set_style(style);
        Ok(pb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Pair;
    use crate::segmenter::{Whitespace, WordCharacters};
    use crate::tokenizer::Tokenizer;

    fn quiet() -> Evaluator {
        Evaluator::new(EvalConfig {
            show_progress: false,
            ..EvalConfig::default()
        })
    }

    #[test]
    fn boundary_vector_marks_token_starts() {
        assert_eq!(
            boundary_vector("hello world", &["hello", "world"]),
            vec![1, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0]
        );
        assert_eq!(boundary_vector("aaa", &["a", "a"]), vec![1, 1, 0]);
    }

    #[test]
    fn boundary_vector_skips_missing_tokens() {
        // "World" does not occur and must neither mark nor advance the search.
        assert_eq!(
            boundary_vector("hello world", &["World", "hello", "", "world"]),
            vec![1, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0]
        );
    }

    #[test]
    fn boundary_vector_counts_characters() {
        assert_eq!(
            boundary_vector("héllo wörld", &["llo", "wö"]),
            vec![0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 0]
        );
    }

    #[test]
    fn identical_segmentations_score_one() {
        let scores = score_line("hello world", &Whitespace, &Whitespace).unwrap();
        assert_eq!(
            scores,
            BoundaryScores {
                precision: 1.0,
                recall: 1.0,
                f1: 1.0
            }
        );
    }

    #[test]
    fn partial_overlap_is_scored_per_position() {
        // candidate marks {0, 2, 6}; reference marks {0, 6}.
        let scores = BoundaryScores::from_vectors(&[1, 0, 1, 0, 0, 0, 1], &[1, 0, 0, 0, 0, 0, 1]);
        assert!((scores.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((scores.recall - 1.0).abs() < 1e-12);
        assert!((scores.f1 - 0.8).abs() < 1e-12);
    }

    #[test]
    fn shorter_vector_is_padded() {
        let scores = BoundaryScores::from_vectors(&[1], &[1, 0, 1]);
        assert!((scores.precision - 1.0).abs() < 1e-12);
        assert!((scores.recall - 0.5).abs() < 1e-12);
    }

    #[test]
    fn undefined_ratios_are_zero() {
        assert_eq!(
            BoundaryScores::from_vectors(&[0, 0], &[0, 0]),
            BoundaryScores::default()
        );
        let scores = BoundaryScores::from_vectors(&[0, 0], &[1, 0]);
        assert_eq!(scores.precision, 0.0);
        assert_eq!(scores.recall, 0.0);
        assert_eq!(scores.f1, 0.0);
    }

    #[test]
    fn corpus_scores_are_means_in_bounds() {
        let merges: Vec<Pair> = vec![("l".into(), "o".into()), ("lo".into(), "w".into())];
        let tok = Tokenizer::new(&merges);
        let corpus = ["low lower", "slow down", "newest lowest"];
        let report = quiet().evaluate(&corpus, &tok, &WordCharacters).unwrap();
        assert_eq!(report.lines, 3);
        for value in [report.precision, report.recall, report.f1] {
            assert!((0.0..=1.0).contains(&value), "{value}");
        }
        // Every word start is also a token start, so recall is perfect.
        assert!((report.recall - 1.0).abs() < 1e-12);
        assert!(report.precision < 1.0);
    }

    #[test]
    fn blank_lines_count_towards_the_mean() {
        let corpus = ["hello world", "", "   "];
        let report = quiet().evaluate(&corpus, &Whitespace, &Whitespace).unwrap();
        assert_eq!(report.lines, 3);
        for value in [report.precision, report.recall, report.f1] {
            assert!((value - 1.0 / 3.0).abs() < 1e-12, "{value}");
        }

        let skipping = Evaluator::new(EvalConfig {
            show_progress: false,
            skip_blank_lines: true,
        });
        let report = skipping.evaluate(&corpus, &Whitespace, &Whitespace).unwrap();
        assert_eq!(report.lines, 1);
        assert_eq!(report.f1, 1.0);
    }

    #[test]
    fn self_comparison_is_perfect() {
        let corpus = vec!["the quick brown fox".to_string(), "jumps over".to_string()];
        let report = quiet().evaluate(&corpus, &Whitespace, &Whitespace).unwrap();
        assert_eq!((report.precision, report.recall, report.f1), (1.0, 1.0, 1.0));
    }

    #[test]
    fn empty_corpus_reports_zeros() {
        let corpus: [&str; 0] = [];
        let report = quiet().evaluate(&corpus, &Whitespace, &Whitespace).unwrap();
        assert_eq!(report, EvaluationReport::default());
    }

    #[test]
    fn closures_compare_against_builtin() {
        let chars = |line: &str| line.chars().map(String::from).collect::<Vec<_>>();
        let report = quiet().evaluate(&["ab cd"], &chars, &Whitespace).unwrap();
        // candidate marks every character (5), reference marks 0 and 3.
        assert!((report.precision - 0.4).abs() < 1e-12);
        assert!((report.recall - 1.0).abs() < 1e-12);
    }
}
