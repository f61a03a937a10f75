//! Configuration builders controlling training, corpus ingestion, and evaluation.

use serde::{Deserialize, Serialize};

use crate::error::{DbpeError, Result};

/// Configuration for defended BPE training.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrainerConfig {
    /// Upper bound on merge steps; training may stop earlier when no pairs remain.
    pub num_merges: usize,
    /// Number of frequency-driven merges between two randomized merges.
    ///
    /// A value of `k` makes every `(k + 1)`-th step a random merge. `None` disables
    /// randomized merges entirely, yielding canonical BPE.
    pub defense_interval: Option<usize>,
    /// Seed for the randomized merge policy; `None` draws from system entropy.
    pub seed: Option<u64>,
    /// Enables per-iteration logging through the `log` facade.
    pub show_progress: bool,
    /// Emit a progress line every `log_every` merges when `show_progress` is set.
    pub log_every: usize,
}

impl TrainerConfig {
    /// Returns a builder initialised with [`TrainerConfig::default`].
    #[must_use]
    pub fn builder() -> TrainerBuilder {
        TrainerBuilder::default()
    }

    /// Validates the invariants required for training.
    pub fn validate(&self) -> Result<()> {
        if self.log_every == 0 {
            return Err(DbpeError::InvalidConfig(
                "log_every must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Returns the step cadence of randomized merges, i.e. `k + 1`.
    ///
    /// `None` when defense is disabled or `k + 1` does not fit in `usize`, in which case
    /// no step index can ever be a multiple of it.
    #[must_use]
    pub fn defense_cadence(&self) -> Option<usize> {
        self.defense_interval.and_then(|k| k.checked_add(1))
    }

    /// Returns true when the 1-indexed `step` must use the randomized merge policy.
    #[must_use]
    pub fn is_defense_step(&self, step: usize) -> bool {
        self.defense_cadence()
            .is_some_and(|cadence| step % cadence == 0)
    }
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            num_merges: 1000,
            defense_interval: Some(10),
            seed: None,
            show_progress: true,
            log_every: 100,
        }
    }
}

/// Builder for [`TrainerConfig`].
#[derive(Debug, Default, Clone)]
pub struct TrainerBuilder {
    cfg: TrainerConfig,
}

impl TrainerBuilder {
    /// Creates a builder with [`TrainerConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of merge steps.
    #[must_use]
    pub fn num_merges(mut self, value: usize) -> Self {
        self.cfg.num_merges = value;
        self
    }

    /// Sets the defense interval `k`; `None` disables randomized merges.
    #[must_use]
    pub fn defense_interval(mut self, value: Option<usize>) -> Self {
        self.cfg.defense_interval = value;
        self
    }

    /// Fixes the seed used by the randomized merge policy.
    #[must_use]
    pub fn seed(mut self, value: Option<u64>) -> Self {
        self.cfg.seed = value;
        self
    }

    /// Enables or disables per-iteration logging.
    #[must_use]
    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.cfg.show_progress = enabled;
        self
    }

    /// Sets how many merges pass between progress lines.
    #[must_use]
    pub fn log_every(mut self, value: usize) -> Self {
        self.cfg.log_every = value;
        self
    }

    /// Finalises the builder, returning a validated [`TrainerConfig`].
    pub fn build(self) -> Result<TrainerConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

/// Layout of corpus files on disk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CorpusFormat {
    /// UTF-8 text consumed as-is.
    #[default]
    PlainText,
    /// One JSON document per line carrying the text under `content` or `text`.
    JsonLines,
}

/// Configuration controlling how text corpora are discovered and read from disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestConfig {
    /// Enables recursive directory traversal.
    pub recursive: bool,
    /// Follows symlinks encountered during traversal.
    pub follow_symlinks: bool,
    /// File extensions (without the leading dot) picked up inside directories.
    /// An empty list accepts every file. Explicitly named files are always read.
    pub extensions: Vec<String>,
    /// How each discovered file is decoded.
    pub format: CorpusFormat,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            follow_symlinks: false,
            extensions: vec!["txt".into()],
            format: CorpusFormat::PlainText,
        }
    }
}

impl IngestConfig {
    /// Returns a builder initialised with [`IngestConfig::default`].
    #[must_use]
    pub fn builder() -> IngestBuilder {
        IngestBuilder::default()
    }

    /// Returns true when `extension` passes the configured filter.
    #[must_use]
    pub fn accepts_extension(&self, extension: Option<&str>) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        extension.is_some_and(|ext| {
            self.extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug, Default, Clone)]
pub struct IngestBuilder {
    cfg: IngestConfig,
}

impl IngestBuilder {
    /// Creates a new builder with [`IngestConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables recursive directory traversal.
    #[must_use]
    pub fn recursive(mut self, enabled: bool) -> Self {
        self.cfg.recursive = enabled;
        self
    }

    /// Enables or disables following of symlinks when traversing directories.
    #[must_use]
    pub fn follow_symlinks(mut self, enabled: bool) -> Self {
        self.cfg.follow_symlinks = enabled;
        self
    }

    /// Replaces the extension filter. Leading dots are stripped.
    #[must_use]
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cfg.extensions = extensions
            .into_iter()
            .map(|ext| ext.into().trim_start_matches('.').to_string())
            .filter(|ext| !ext.is_empty())
            .collect();
        self
    }

    /// Selects the on-disk corpus format.
    #[must_use]
    pub fn format(mut self, format: CorpusFormat) -> Self {
        self.cfg.format = format;
        self
    }

    /// Finalises the builder, returning the [`IngestConfig`].
    pub fn build(self) -> IngestConfig {
        self.cfg
    }
}

/// Configuration for boundary-based evaluation runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvalConfig {
    /// Draws a progress bar on stderr while lines are scored.
    pub show_progress: bool,
    /// Drops lines that are empty after trimming before scoring. Off by default: a blank
    /// line scores zero and counts towards the mean like any other line.
    pub skip_blank_lines: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            show_progress: true,
            skip_blank_lines: false,
        }
    }
}
