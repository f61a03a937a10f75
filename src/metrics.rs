//! Metrics describing the evolution of the training process.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::Pair;

/// Reason a training run terminated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// The configured number of merge steps was performed.
    MergeBudgetReached,
    /// Every vocabulary entry collapsed to a single symbol before the budget ran out.
    NoPairsRemaining,
}

/// How the pair of a merge step was chosen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// The pair with the highest aggregate frequency, ties to the first seen.
    MostFrequent,
    /// A pair drawn uniformly at random from the occurring pairs (defense step).
    Random,
}

/// Metrics captured for each merge iteration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IterationMetrics {
    /// Sequential iteration number (1-indexed).
    pub iteration: usize,
    /// Pair merged in this iteration.
    pub pair: Pair,
    /// Aggregate frequency of the merged pair.
    pub frequency: u64,
    /// Policy that selected the pair.
    pub policy: SelectionPolicy,
    /// Count of distinct pairs observed before the merge.
    pub distinct_pairs: usize,
    /// Vocabulary entries rewritten by the merge.
    pub entries_rewritten: usize,
    /// Execution time for the iteration.
    pub elapsed_iteration: Duration,
    /// Total time elapsed since training started.
    pub elapsed_total: Duration,
}

/// Aggregate metrics produced by a training session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingMetrics {
    /// Per-iteration snapshots accrued during training.
    pub iterations: Vec<IterationMetrics>,
    /// Total duration of the training session.
    pub total_duration: Duration,
    /// Reason training terminated.
    pub stop_reason: StopReason,
}

impl TrainingMetrics {
    /// Creates an empty metrics container with pre-allocated capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            iterations: Vec::with_capacity(capacity),
            total_duration: Duration::ZERO,
            stop_reason: StopReason::MergeBudgetReached,
        }
    }

    /// 1-indexed iterations that used the randomized policy.
    #[must_use]
    pub fn defense_steps(&self) -> Vec<usize> {
        self.iterations
            .iter()
            .filter(|metrics| metrics.policy == SelectionPolicy::Random)
            .map(|metrics| metrics.iteration)
            .collect()
    }
}
