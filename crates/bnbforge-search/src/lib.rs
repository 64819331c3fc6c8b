//! BnBForge search engine
//!
//! This crate runs a branch-and-bound search across a set of simulated
//! localities that cooperate by message passing:
//! - Position index: per-task cursor over the lazily generated tree
//! - Search manager: per-locality store of stealable work
//! - Scheduler: throttled dispatch loop with local and remote stealing
//! - Registry and incumbent: local pruning bound and the global best node
//! - Orchestration: bootstrap, expansion, path replay and termination

pub mod bnb;
pub mod completion;
pub mod incumbent;
pub mod locality;
pub mod position;
pub mod registry;
pub mod scheduler;
pub mod semaphore;
pub mod shared;
pub mod stats;
pub mod work_queue;

pub use bnb::{BranchAndBound, SearchContext, SearchOutcome, Worker};
pub use completion::{completion, CompletionFuture, CompletionHandle, TaskResult};
pub use incumbent::{ImprovementSender, Incumbent, IncumbentActor, IncumbentHandle};
pub use locality::{Cluster, Fabric, LocalityHandle, LocalityMessage};
pub use position::PositionIndex;
pub use registry::{BoundCell, Registry};
pub use scheduler::{Scheduler, SchedulerHandle, TaskRunner};
pub use semaphore::TaskSemaphore;
pub use shared::{SharedState, StealResponse};
pub use stats::{
    total_node_counts, LocalityCounters, LocalityStatistics, NodeCounter, SearchStatistics,
};
pub use work_queue::{SearchManager, TaskDescriptor, TaskSlot};
