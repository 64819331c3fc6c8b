//! BnBForge - A distributed branch-and-bound search skeleton in Rust
//!
//! Plug in a child generator and a bound function, then call
//! [`BranchAndBound::search`]. The search spreads over simulated localities
//! that balance load by work stealing and share the best bound by message
//! passing.
//!
//! # Example
//!
//! ```rust
//! use bnbforge::prelude::*;
//!
//! let config = SearchConfig::new()
//!     .with_localities(2)
//!     .with_objective(Objective::Minimize);
//! assert!(config.is_distributed());
//! assert!(Objective::Minimize.is_better(1, 2));
//! ```

pub use bnbforge_core::{
    BnbError, BoundFunction, BoundValue, Children, Generator, Node, Objective, Path, Result,
    SearchNode,
};

pub use bnbforge_config::{ConfigError, SearchConfig, StealChunk};

pub use bnbforge_search::{
    total_node_counts, BranchAndBound, ImprovementSender, LocalityStatistics, SearchOutcome,
    SearchStatistics,
};

#[cfg(feature = "console")]
pub mod console;

/// Creates a channel for streaming incumbent improvements.
///
/// Pass the sender to [`BranchAndBound::with_improvement_sender`].
pub fn improvement_channel<N: SearchNode>() -> (
    ImprovementSender<N>,
    tokio::sync::mpsc::UnboundedReceiver<(N, N::Bound)>,
) {
    tokio::sync::mpsc::unbounded_channel()
}

pub mod prelude {
    pub use super::{
        BnbError, BoundFunction, BranchAndBound, Children, Generator, Node, Objective, Path,
        SearchConfig, SearchNode, SearchOutcome, StealChunk,
    };
}
