//! Configuration system for BnBForge.
//!
//! Load search configuration from TOML or YAML files to control the
//! simulated deployment (localities, worker threads), the objective
//! direction, pruning, and work-stealing behaviour without code changes.
//!
//! # Examples
//!
//! Load configuration from a TOML string:
//!
//! ```
//! use bnbforge_config::{SearchConfig, StealChunk};
//! use bnbforge_core::Objective;
//!
//! let config = SearchConfig::from_toml_str(r#"
//!     localities = 4
//!     threads_per_locality = 2
//!     objective = "minimize"
//!     prune_level = true
//!     steal_chunk = "half"
//! "#).unwrap();
//!
//! assert_eq!(config.localities, 4);
//! assert_eq!(config.objective, Objective::Minimize);
//! assert_eq!(config.steal_chunk, StealChunk::Half);
//! ```
//!
//! Use default config when file is missing:
//!
//! ```
//! use bnbforge_config::SearchConfig;
//!
//! let config = SearchConfig::load("search.toml").unwrap_or_default();
//! assert_eq!(config.localities, 1);
//! ```

use std::path::Path;
use std::time::Duration;

use bnbforge_core::Objective;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Default idle backoff of a scheduler that found no work.
const DEFAULT_IDLE_BACKOFF_MICROS: u64 = 100;

/// Default deepest depth given its own node-counter bucket.
const DEFAULT_MAX_STATS_DEPTH: usize = 128;

/// Main search configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SearchConfig {
    /// Number of cooperating localities.
    pub localities: usize,

    /// Worker threads per locality.
    ///
    /// The scheduler keeps at most `threads_per_locality - 1` tasks expanding
    /// at once (never fewer than one).
    pub threads_per_locality: usize,

    /// Direction of optimization.
    pub objective: Objective,

    /// Discard all remaining siblings once one child fails the bound test.
    ///
    /// Only sound when the generator yields children in non-increasing
    /// bound order.
    pub prune_level: bool,

    /// How many unexplored positions a single steal takes.
    pub steal_chunk: StealChunk,

    /// Sleep time of an idle scheduler before it retries.
    pub idle_backoff_micros: u64,

    /// Random seed for steal victim selection.
    pub random_seed: Option<u64>,

    /// Deepest depth given its own node-counter bucket.
    ///
    /// Counters keep `max_stats_depth + 1` buckets; deeper nodes are
    /// counted in the last one.
    pub max_stats_depth: usize,

    /// Stack size for worker threads, in bytes.
    ///
    /// Every dispatched task runs on its own thread. At most
    /// [`SearchConfig::dispatch_slots`] of them are expanding at once, but a
    /// task whose work was stolen keeps its thread parked until all of its
    /// stolen descendants finish. A locality can therefore hold up to
    /// `dispatch_slots` expanding threads plus one parked thread per task it
    /// ran that is still waiting on thieves; `peak_workers` in the search
    /// statistics reports the high-water mark. Coarser steal chunks mean
    /// fewer, larger stolen tasks and therefore fewer parked threads.
    pub worker_stack_size: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            localities: 1,
            threads_per_locality: default_thread_count(),
            objective: Objective::Maximize,
            prune_level: false,
            steal_chunk: StealChunk::Single,
            idle_backoff_micros: DEFAULT_IDLE_BACKOFF_MICROS,
            random_seed: None,
            max_stats_depth: DEFAULT_MAX_STATS_DEPTH,
            worker_stack_size: None,
        }
    }
}

fn default_thread_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl SearchConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if file doesn't exist or contains invalid TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_file(path)
    }

    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parses configuration from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration describes a runnable deployment.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.localities == 0 {
            return Err(ConfigError::Invalid(
                "at least one locality is required".to_string(),
            ));
        }
        if self.threads_per_locality == 0 {
            return Err(ConfigError::Invalid(
                "threads_per_locality must be positive".to_string(),
            ));
        }
        if self.worker_stack_size == Some(0) {
            return Err(ConfigError::Invalid(
                "worker_stack_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the number of localities.
    pub fn with_localities(mut self, localities: usize) -> Self {
        self.localities = localities;
        self
    }

    /// Sets the number of worker threads per locality.
    pub fn with_threads_per_locality(mut self, threads: usize) -> Self {
        self.threads_per_locality = threads;
        self
    }

    /// Sets the objective direction.
    pub fn with_objective(mut self, objective: Objective) -> Self {
        self.objective = objective;
        self
    }

    /// Enables or disables level pruning.
    pub fn with_prune_level(mut self, prune_level: bool) -> Self {
        self.prune_level = prune_level;
        self
    }

    /// Sets the steal chunk policy.
    pub fn with_steal_chunk(mut self, chunk: StealChunk) -> Self {
        self.steal_chunk = chunk;
        self
    }

    /// Sets the random seed.
    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Sets the idle backoff in microseconds.
    pub fn with_idle_backoff_micros(mut self, micros: u64) -> Self {
        self.idle_backoff_micros = micros;
        self
    }

    /// Returns the idle backoff as a Duration.
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_micros(self.idle_backoff_micros)
    }

    /// Number of tasks a locality may have expanding at once.
    ///
    /// # Examples
    ///
    /// ```
    /// use bnbforge_config::SearchConfig;
    ///
    /// assert_eq!(SearchConfig::new().with_threads_per_locality(1).dispatch_slots(), 1);
    /// assert_eq!(SearchConfig::new().with_threads_per_locality(8).dispatch_slots(), 7);
    /// ```
    pub fn dispatch_slots(&self) -> usize {
        if self.threads_per_locality <= 1 {
            1
        } else {
            self.threads_per_locality - 1
        }
    }

    /// Returns true if more than one locality takes part.
    pub fn is_distributed(&self) -> bool {
        self.localities > 1
    }
}

/// Size of the contiguous tail of positions granted by one steal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StealChunk {
    /// Grant the last remaining position only.
    #[default]
    Single,

    /// Grant the back half of the remaining positions (rounded up).
    Half,

    /// Grant every remaining position.
    All,
}

impl StealChunk {
    /// Number of positions to grant when `remaining` are available.
    ///
    /// Always between 1 and `remaining` when `remaining > 0`.
    pub fn take(self, remaining: usize) -> usize {
        match self {
            _ if remaining == 0 => 0,
            StealChunk::Single => 1,
            StealChunk::Half => remaining.div_ceil(2),
            StealChunk::All => remaining,
        }
    }
}
