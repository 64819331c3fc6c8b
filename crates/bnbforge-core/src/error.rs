//! Error types for BnBForge

use thiserror::Error;

use crate::path::Path;

/// Main error type for branch-and-bound searches.
///
/// Steal misses and stale bound updates are not errors; they are reported as
/// `None` or silently dropped by the apply-if-better checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BnbError {
    /// A generator or bound function failed
    #[error("Plugin error: {0}")]
    Plugin(String),

    /// The generator produced fewer children than it declared
    #[error("Generator declared {declared} children but position {position} is missing")]
    ChildCountMismatch { declared: usize, position: usize },

    /// A path could not be replayed from the root
    #[error("Invalid path: {0}")]
    InvalidPath(Path),

    /// A locality's mailbox has been disconnected
    #[error("Locality {0} is unavailable")]
    LocalityUnavailable(usize),

    /// The global incumbent actor is unreachable
    #[error("Incumbent is unavailable")]
    IncumbentUnavailable,

    /// A task dropped its completion handle without reporting
    #[error("Task was lost before reporting completion")]
    TaskLost,

    /// Invalid runtime configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The runtime could not start a thread or actor
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl BnbError {
    /// Convenience constructor for plugin failures.
    pub fn plugin(message: impl Into<String>) -> Self {
        BnbError::Plugin(message.into())
    }
}

/// Result type alias for BnBForge operations
pub type Result<T> = std::result::Result<T, BnbError>;
