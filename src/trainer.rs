//! Core training loop responsible for producing tokenizer artefacts.
//!
//! Every step recomputes pair statistics from scratch, picks a pair, and rewrites the
//! whole vocabulary. Steps whose 1-indexed position is a multiple of `k + 1` pick the
//! pair uniformly at random instead of by frequency.

use std::time::Instant;
use std::{fmt, path::Path};

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{IngestConfig, TrainerBuilder, TrainerConfig};
use crate::corpus::load_text_corpus;
use crate::error::Result;
use crate::metrics::{IterationMetrics, SelectionPolicy, StopReason, TrainingMetrics};
use crate::model::{BpeModel, Pair};
use crate::vocab::{MergeSummary, PairRef, PairStats, Vocabulary};

/// High-level façade configuring and executing BPE training runs.
#[derive(Debug, Clone)]
pub struct Trainer {
    cfg: TrainerConfig,
}

/// Artifacts returned after a training session completes.
#[must_use]
#[derive(Debug, Clone)]
pub struct TrainerArtifacts {
    /// Trained BPE model.
    pub model: BpeModel,
    /// Detailed metrics captured during training.
    pub metrics: TrainingMetrics,
}

/// Outcome of a single merge step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// The merged pair, appended to the merge table.
    pub pair: Pair,
    /// Aggregate frequency of the pair before merging.
    pub frequency: u64,
    /// Policy that chose the pair.
    pub policy: SelectionPolicy,
    /// Distinct pairs present before merging.
    pub distinct_pairs: usize,
    /// How much of the vocabulary the merge touched.
    pub summary: MergeSummary,
}

/// Chooses the pair to merge from `stats` according to `policy`.
pub fn select_pair<'a, R: Rng + ?Sized>(
    stats: &PairStats<'a>,
    policy: SelectionPolicy,
    rng: &mut R,
) -> Option<(PairRef<'a>, u64)> {
    match policy {
        SelectionPolicy::MostFrequent => stats.most_frequent(),
        SelectionPolicy::Random => stats.choose_random(rng),
    }
}

/// Runs one training step on `vocab`.
///
/// Returns the rewritten vocabulary and the step outcome, or the untouched vocabulary and
/// `None` when no adjacent pair is left.
pub fn merge_step<R: Rng + ?Sized>(
    vocab: Vocabulary,
    policy: SelectionPolicy,
    rng: &mut R,
) -> (Vocabulary, Option<StepOutcome>) {
    let selected = {
        let stats = vocab.pair_stats();
        let distinct_pairs = stats.len();
        select_pair(&stats, policy, rng).map(|((left, right), frequency)| {
            ((left.to_string(), right.to_string()), frequency, distinct_pairs)
        })
    };
    let Some((pair, frequency, distinct_pairs)) = selected else {
        return (vocab, None);
    };

    let (vocab, summary) = vocab.merge_pair(&pair.0, &pair.1);
    let outcome = StepOutcome {
        pair,
        frequency,
        policy,
        distinct_pairs,
        summary,
    };
    (vocab, Some(outcome))
}

impl Trainer {
    /// Creates a new trainer for the supplied configuration.
    #[must_use]
    pub fn new(cfg: TrainerConfig) -> Self {
        Self { cfg }
    }

    /// Returns a [`TrainerBuilder`] with default settings.
    #[must_use]
    pub fn builder() -> TrainerBuilder {
        TrainerConfig::builder()
    }

    /// Returns an immutable reference to the underlying configuration.
    #[must_use]
    pub fn config(&self) -> &TrainerConfig {
        &self.cfg
    }

    /// Trains a model by loading text files from disk according to [`IngestConfig`].
    pub fn train_from_paths<P: AsRef<Path>>(
        &self,
        inputs: &[P],
        ingest: &IngestConfig,
    ) -> Result<TrainerArtifacts> {
        let corpus = load_text_corpus(inputs, ingest)?;
        self.train_from_text(&corpus)
    }

    /// Trains a model from an in-memory corpus.
    pub fn train_from_text(&self, corpus: &str) -> Result<TrainerArtifacts> {
        let vocab = Vocabulary::from_text(corpus);
        if self.cfg.show_progress {
            info!(
                "vocabulary: {} distinct words, {} occurrences, {} symbols",
                vocab.len(),
                vocab.total_frequency(),
                vocab.symbol_count()
            );
        }
        self.train(vocab)
    }

    /// Trains on a prepared vocabulary, seeding the random policy from the configuration.
    pub fn train(&self, vocab: Vocabulary) -> Result<TrainerArtifacts> {
        let mut rng = match self.cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.train_with_rng(vocab, &mut rng)
    }

    /// Trains on a prepared vocabulary drawing defense-step randomness from `rng`.
    pub fn train_with_rng<R: Rng + ?Sized>(
        &self,
        vocab: Vocabulary,
        rng: &mut R,
    ) -> Result<TrainerArtifacts> {
        self.cfg.validate()?;

        let mut vocab = vocab;
        let mut merges: Vec<Pair> = Vec::with_capacity(self.cfg.num_merges.min(16_384));
        let mut metrics = TrainingMetrics::new(self.cfg.num_merges.min(16_384));
        let training_start = Instant::now();

        for iteration in 1..=self.cfg.num_merges {
            let iteration_start = Instant::now();
            let policy = if self.cfg.is_defense_step(iteration) {
                SelectionPolicy::Random
            } else {
                SelectionPolicy::MostFrequent
            };

            let (next, outcome) = merge_step(vocab, policy, rng);
            vocab = next;
            let Some(outcome) = outcome else {
                metrics.stop_reason = StopReason::NoPairsRemaining;
                break;
            };

            if policy == SelectionPolicy::Random {
                debug!(
                    "defense step {iteration}: random merge {:?} + {:?} (freq {})",
                    outcome.pair.0, outcome.pair.1, outcome.frequency
                );
            }
            if self.cfg.show_progress && iteration % self.cfg.log_every == 0 {
                info!(
                    "iter {:>6} freq {:>8} entries {:>8} distinct_pairs {:>8} pair {:?}",
                    iteration,
                    outcome.frequency,
                    outcome.summary.entries_rewritten,
                    outcome.distinct_pairs,
                    outcome.pair
                );
            }

            metrics.iterations.push(IterationMetrics {
                iteration,
                pair: outcome.pair.clone(),
                frequency: outcome.frequency,
                policy,
                distinct_pairs: outcome.distinct_pairs,
                entries_rewritten: outcome.summary.entries_rewritten,
                elapsed_iteration: iteration_start.elapsed(),
                elapsed_total: training_start.elapsed(),
            });
            merges.push(outcome.pair);
        }

        let total_duration = training_start.elapsed();
        metrics.total_duration = total_duration;

        if self.cfg.show_progress {
            info!(
                "completed {} merges ({} random) in {:.2?}; stop reason {:?}",
                merges.len(),
                metrics.defense_steps().len(),
                total_duration,
                metrics.stop_reason
            );
        }

        let model = BpeModel::new(merges, vocab);
        Ok(TrainerArtifacts { model, metrics })
    }
}

impl fmt::Display for TrainerArtifacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "BPE model with {} merges", self.model.merges().len())?;
        writeln!(f, "Random merges: {}", self.metrics.defense_steps().len())?;
        writeln!(f, "Stop reason: {:?}", self.metrics.stop_reason)?;
        writeln!(f, "Total duration: {:?}", self.metrics.total_duration)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestConfig;
    use rand::rngs::mock::StepRng;
    use std::fs;
    use tempfile::tempdir;

    const PANGRAMS: &str = "the quick brown fox jumps over the lazy dog\n\
                            pack my box with five dozen liquor jugs\n\
                            sphinx of black quartz judge my vow";

    fn trainer(num_merges: usize, defense_interval: Option<usize>, seed: u64) -> Trainer {
        let cfg = TrainerConfig::builder()
            .num_merges(num_merges)
            .defense_interval(defense_interval)
            .seed(Some(seed))
            .show_progress(false)
            .build()
            .unwrap();
        Trainer::new(cfg)
    }

    fn pair(left: &str, right: &str) -> Pair {
        (left.to_string(), right.to_string())
    }

    #[test]
    fn single_step_merges_most_frequent_pair() {
        let vocab =
            Vocabulary::from_entries([("l o w </w>", 5), ("l o w e r </w>", 2)]).unwrap();
        let artefacts = trainer(1, Some(1_000_000), 7).train(vocab).unwrap();
        assert_eq!(artefacts.model.merges(), &[pair("l", "o")]);
        let expected =
            Vocabulary::from_entries([("lo w </w>", 5), ("lo w e r </w>", 2)]).unwrap();
        assert_eq!(artefacts.model.vocab(), &expected);
        assert_eq!(artefacts.metrics.iterations[0].frequency, 7);
        assert_eq!(artefacts.metrics.stop_reason, StopReason::MergeBudgetReached);
    }

    #[test]
    fn same_seed_reproduces_merge_table() {
        let first = trainer(30, Some(2), 42).train_from_text(PANGRAMS).unwrap();
        let second = trainer(30, Some(2), 42).train_from_text(PANGRAMS).unwrap();
        assert_eq!(first.model.merges(), second.model.merges());
        assert_eq!(first.model.vocab(), second.model.vocab());
    }

    #[test]
    fn defense_steps_follow_interval() {
        let artefacts = trainer(10, Some(2), 3).train_from_text(PANGRAMS).unwrap();
        assert_eq!(artefacts.model.merges().len(), 10);
        assert_eq!(artefacts.metrics.defense_steps(), vec![3, 6, 9]);
    }

    #[test]
    fn frequency_steps_pick_the_maximum_pair() {
        let vocab = Vocabulary::from_text(PANGRAMS);
        let artefacts = trainer(20, Some(3), 11).train(vocab.clone()).unwrap();

        let mut replay = vocab;
        for metrics in &artefacts.metrics.iterations {
            if metrics.policy == SelectionPolicy::MostFrequent {
                let stats = replay.pair_stats();
                let ((left, right), frequency) = stats.most_frequent().unwrap();
                assert_eq!(metrics.pair, pair(left, right));
                assert_eq!(metrics.frequency, frequency);
            }
            replay = replay.merge_pair(&metrics.pair.0, &metrics.pair.1).0;
        }
        assert_eq!(&replay, artefacts.model.vocab());
    }

    #[test]
    fn random_step_uses_injected_source() {
        // (c, d) is the most frequent pair; a source that always yields zero selects the
        // first pair seen instead.
        let vocab = Vocabulary::from_entries([("a b </w>", 1), ("c d </w>", 5)]).unwrap();
        let mut rng = StepRng::new(0, 0);
        let artefacts = trainer(1, Some(0), 0)
            .train_with_rng(vocab, &mut rng)
            .unwrap();
        assert_eq!(artefacts.model.merges(), &[pair("a", "b")]);
        assert_eq!(artefacts.metrics.iterations[0].policy, SelectionPolicy::Random);
    }

    #[test]
    fn merge_step_shrinks_entries_containing_the_pair() {
        let vocab = Vocabulary::from_text("banana bandana cab");
        let before: Vec<usize> = vocab.entries().iter().map(|e| e.symbols().len()).collect();
        let mut rng = StepRng::new(0, 0);
        let (after, outcome) = merge_step(vocab, SelectionPolicy::MostFrequent, &mut rng);
        let outcome = outcome.unwrap();
        assert_eq!(outcome.pair, pair("a", "n"));
        let after_lens: Vec<usize> = after.entries().iter().map(|e| e.symbols().len()).collect();
        // banana: a n a n a -> an an a, bandana: an d an a, cab untouched.
        assert_eq!(before, vec![7, 8, 4]);
        assert_eq!(after_lens, vec![5, 6, 4]);
        assert_eq!(outcome.summary.entries_rewritten, 2);
    }

    #[test]
    fn training_stops_when_pairs_run_out() {
        let artefacts = trainer(50, None, 0).train_from_text("ab ab").unwrap();
        assert_eq!(
            artefacts.model.merges(),
            &[pair("a", "b"), pair("ab", "</w>")]
        );
        assert_eq!(artefacts.metrics.stop_reason, StopReason::NoPairsRemaining);
        assert_eq!(artefacts.model.vocab().get("ab</w>"), Some(2));
    }

    #[test]
    fn degenerate_inputs_yield_empty_tables() {
        let empty = trainer(10, Some(1), 0).train(Vocabulary::default()).unwrap();
        assert!(empty.model.merges().is_empty());
        assert_eq!(empty.metrics.stop_reason, StopReason::NoPairsRemaining);

        let zero = trainer(0, Some(1), 0).train_from_text(PANGRAMS).unwrap();
        assert!(zero.model.merges().is_empty());
        assert_eq!(zero.model.vocab(), &Vocabulary::from_text(PANGRAMS));
    }

    #[test]
    fn trains_from_corpus_directory() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("a.txt"), "low lower").unwrap();
        fs::write(dir.path().join("b.txt"), "newest lowest").unwrap();
        fs::write(dir.path().join("ignored.bin"), [0xFFu8, 0xFE]).unwrap();
        let artefacts = trainer(5, None, 0)
            .train_from_paths(&[dir.path()], &IngestConfig::default())
            .unwrap();
        assert_eq!(artefacts.model.merges().len(), 5);
        assert_eq!(artefacts.model.vocab().len(), 4);
        assert!(artefacts.to_string().contains("5 merges"));
    }
}
