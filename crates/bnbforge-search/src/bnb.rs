//! Branch-and-bound orchestration.
//!
//! [`BranchAndBound::search`] bootstraps the localities and the incumbent,
//! submits the root task, blocks until that task and everything stolen from
//! it have finished, then stops the schedulers and reads the incumbent.
//!
//! Each dispatched task is run by a [`Worker`]: it replays its path from the
//! root, then expands its subtree depth first with an explicit stack of
//! child generators, yielding to steal requests at the entry of every node.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use bnbforge_config::SearchConfig;
use bnbforge_core::{BnbError, BoundFunction, Children, Generator, Path, Result, SearchNode};

use crate::completion::completion;
use crate::incumbent::{ImprovementSender, Incumbent, IncumbentActor, IncumbentHandle};
use crate::locality::{Cluster, Fabric};
use crate::position::PositionIndex;
use crate::registry::Registry;
use crate::scheduler::TaskRunner;
use crate::semaphore::TaskSemaphore;
use crate::shared::SharedState;
use crate::stats::{LocalityCounters, SearchStatistics};
use crate::work_queue::{SearchManager, TaskDescriptor, TaskSlot};

/// Problem plug-ins and configuration shared by every locality of a search.
#[derive(Debug)]
pub struct SearchContext<G, F> {
    /// Child generator.
    pub generator: Arc<G>,
    /// Bound function.
    pub bound: Arc<F>,
    /// Runtime configuration.
    pub config: SearchConfig,
}

impl<G, F> SearchContext<G, F>
where
    G: Generator,
    F: BoundFunction<G::Space, G::Node>,
{
    /// Rebuilds the node at `path` by replaying the generator from `root`.
    ///
    /// Each step picks the n-th child of the previous node. The leading root
    /// sentinel of `path` is skipped.
    pub fn get_starting_node(
        &self,
        space: &G::Space,
        root: &G::Node,
        path: &Path,
    ) -> Result<G::Node> {
        let mut node = root.clone();
        for &step in path.steps() {
            let mut children = self.generator.generate(space, &node)?;
            if step >= children.num_children() {
                return Err(BnbError::InvalidPath(path.clone()));
            }
            node = children
                .nth(step)
                .ok_or_else(|| BnbError::InvalidPath(path.clone()))?;
        }
        Ok(node)
    }
}

/// Children of one node on the expansion stack, with the generator kept in
/// step with the position index.
struct GeneratorFrame<I> {
    children: Children<I>,
    cursor: usize,
}

impl<I: Iterator> GeneratorFrame<I> {
    fn new(children: Children<I>) -> Self {
        Self {
            children,
            cursor: 0,
        }
    }

    /// Advances to `position`, skipping positions given away or pruned.
    fn child_at(&mut self, position: usize) -> Result<I::Item> {
        let skip = position - self.cursor;
        let child = self
            .children
            .nth(skip)
            .ok_or(BnbError::ChildCountMismatch {
                declared: self.children.num_children(),
                position,
            })?;
        self.cursor = position + 1;
        Ok(child)
    }
}

/// Runs the tasks dispatched on one locality.
pub struct Worker<G: Generator, F> {
    locality: usize,
    context: Arc<SearchContext<G, F>>,
    registry: Arc<Registry<G::Space, G::Node>>,
    manager: Arc<SearchManager>,
    counters: Arc<LocalityCounters>,
    fabric: Fabric<G>,
    semaphore: TaskSemaphore,
}

impl<G, F> Worker<G, F>
where
    G: Generator,
    F: BoundFunction<G::Space, G::Node>,
{
    /// Creates the worker of `locality`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        locality: usize,
        context: Arc<SearchContext<G, F>>,
        registry: Arc<Registry<G::Space, G::Node>>,
        manager: Arc<SearchManager>,
        counters: Arc<LocalityCounters>,
        fabric: Fabric<G>,
        semaphore: TaskSemaphore,
    ) -> Self {
        Self {
            locality,
            context,
            registry,
            manager,
            counters,
            fabric,
            semaphore,
        }
    }

    /// Runs one task to completion.
    ///
    /// Expands the task's subtree, leaves the manager, frees the dispatch
    /// permit, then waits for every task stolen from it before fulfilling
    /// its completion handle. A failure aborts the whole search; a panicking
    /// plug-in is reported as [`BnbError::Plugin`] through the same path.
    pub fn search_child_task(&self, task: TaskDescriptor, slot: TaskSlot) {
        let mut pos = PositionIndex::for_task(&task, self.context.config.steal_chunk);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.context
                .get_starting_node(self.registry.space(), self.registry.root(), &task.path)
                .and_then(|node| self.expand(&mut pos, node, &slot.shared))
        }))
        .unwrap_or_else(|payload| Err(BnbError::Plugin(panic_message(payload.as_ref()))));

        if let Err(e) = &result {
            warn!(
                event = "search_aborted",
                locality = self.locality,
                path = %task.path,
                error = %e,
            );
            self.registry.abort();
            self.fabric.broadcast_abort();
        }

        self.manager.done(slot.index);
        self.semaphore.signal();

        let joined = pos.wait_futures();
        task.completion.complete(result.and(joined));
    }

    /// Serves a pending steal, then generates the children of `node`.
    ///
    /// Returns `None` once the search has been aborted.
    fn enter(
        &self,
        pos: &mut PositionIndex,
        node: &G::Node,
        shared: &SharedState,
    ) -> Result<Option<GeneratorFrame<G::Iter>>> {
        shared.serve(|| pos.steal());
        if self.registry.is_aborted() {
            return Ok(None);
        }
        let children = self.context.generator.generate(self.registry.space(), node)?;
        pos.set_num_children(children.num_children());
        Ok(Some(GeneratorFrame::new(children)))
    }

    /// Explores the subtree below `node` owned by `pos`.
    ///
    /// Children failing the bound test are pruned (with the rest of their
    /// level when level pruning is on). A child whose own value beats the
    /// local bound becomes an incumbent candidate and is still descended
    /// into.
    fn expand(&self, pos: &mut PositionIndex, node: G::Node, shared: &SharedState) -> Result<()> {
        let objective = self.registry.objective();
        let prune_level = self.context.config.prune_level;

        let mut stack = Vec::new();
        match self.enter(pos, &node, shared)? {
            Some(frame) => stack.push(frame),
            None => return Ok(()),
        }

        while let Some(frame) = stack.last_mut() {
            let Some(position) = pos.next_position() else {
                stack.pop();
                pos.post_expand();
                continue;
            };
            let child = frame.child_at(position)?;

            let best = self.registry.local_bound();
            let upper = self.context.bound.bound(self.registry.space(), &child)?;
            if objective.can_prune(upper, best) {
                self.counters.record_prune();
                if prune_level {
                    pos.prune_level();
                }
                continue;
            }

            if objective.is_better(child.objective(), best) {
                self.improve(&child)?;
            }

            pos.pre_expand(position);
            self.counters.nodes.record(pos.node_depth());
            match self.enter(pos, &child, shared)? {
                Some(frame) => stack.push(frame),
                None => return Ok(()),
            }
        }
        Ok(())
    }

    /// Publishes an improving node locally, to every peer and to the
    /// incumbent.
    fn improve(&self, node: &G::Node) -> Result<()> {
        let value = node.objective();
        if self.registry.update_bound(value) {
            self.fabric.broadcast_bound(self.locality, value)?;
        }
        self.registry.incumbent().update(node.clone())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("plug-in panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("plug-in panicked: {message}")
    } else {
        "plug-in panicked".to_string()
    }
}

impl<G, F> TaskRunner for Worker<G, F>
where
    G: Generator,
    F: BoundFunction<G::Space, G::Node>,
{
    fn run(&self, task: TaskDescriptor, slot: TaskSlot) {
        self.search_child_task(task, slot);
    }
}

/// Result of a finished search.
#[derive(Debug, Clone)]
pub struct SearchOutcome<N> {
    /// Best node found (the root if nothing beat it).
    pub best: N,
    /// Counters collected from every locality.
    pub statistics: SearchStatistics,
}

impl<N: SearchNode> SearchOutcome<N> {
    /// Objective value of the best node.
    pub fn bound(&self) -> N::Bound {
        self.best.objective()
    }
}

/// Distributed branch-and-bound optimizer.
///
/// # Examples
///
/// ```
/// use bnbforge_core::{Children, Generator, Node, Result};
/// use bnbforge_config::SearchConfig;
/// use bnbforge_search::BranchAndBound;
///
/// // Picks digits left to right; the value is the number spelled so far.
/// struct Digits;
///
/// type DigitNode = Node<Vec<u8>, u64, ()>;
///
/// impl Generator for Digits {
///     type Space = usize;
///     type Node = DigitNode;
///     type Iter = std::vec::IntoIter<DigitNode>;
///
///     fn generate(&self, len: &usize, node: &DigitNode) -> Result<Children<Self::Iter>> {
///         if node.solution.len() == *len {
///             return Ok(Children::from_vec(Vec::new()));
///         }
///         let children = [9u8, 4, 1]
///             .into_iter()
///             .map(|d| {
///                 let mut digits = node.solution.clone();
///                 digits.push(d);
///                 Node::new(digits, node.bound * 10 + d as u64, ())
///             })
///             .collect();
///         Ok(Children::from_vec(children))
///     }
/// }
///
/// let config = SearchConfig::new().with_threads_per_locality(2).with_random_seed(1);
/// let optimizer = BranchAndBound::new(Digits, |_: &usize, _: &DigitNode| u64::MAX)
///     .with_config(config);
/// let outcome = optimizer.search(3, Node::new(Vec::new(), 0, ())).unwrap();
/// assert_eq!(outcome.bound(), 999);
/// ```
pub struct BranchAndBound<G: Generator, F> {
    generator: Arc<G>,
    bound: Arc<F>,
    config: SearchConfig,
    improvements: Option<ImprovementSender<G::Node>>,
}

impl<G, F> BranchAndBound<G, F>
where
    G: Generator,
    F: BoundFunction<G::Space, G::Node>,
{
    /// Creates an optimizer with the default configuration.
    pub fn new(generator: G, bound: F) -> Self {
        Self {
            generator: Arc::new(generator),
            bound: Arc::new(bound),
            config: SearchConfig::default(),
            improvements: None,
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    /// Streams every accepted incumbent improvement to `sender`.
    pub fn with_improvement_sender(mut self, sender: ImprovementSender<G::Node>) -> Self {
        self.improvements = Some(sender);
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn context(&self) -> Arc<SearchContext<G, F>> {
        Arc::new(SearchContext {
            generator: Arc::clone(&self.generator),
            bound: Arc::clone(&self.bound),
            config: self.config.clone(),
        })
    }

    /// Rebuilds the node at `path` below `root`.
    pub fn get_starting_node(
        &self,
        space: &G::Space,
        root: &G::Node,
        path: &Path,
    ) -> Result<G::Node> {
        self.context().get_starting_node(space, root, path)
    }

    /// Searches the tree below `root` and returns the best node found.
    ///
    /// Blocks until the search has finished on every locality. A plugin
    /// failure anywhere aborts the search and is returned as the error.
    pub fn search(&self, space: G::Space, root: G::Node) -> Result<SearchOutcome<G::Node>> {
        self.config
            .validate()
            .map_err(|e| BnbError::Config(e.to_string()))?;

        let start = Instant::now();
        info!(
            event = "search_start",
            localities = self.config.localities,
            threads_per_locality = self.config.threads_per_locality,
            objective = %self.config.objective,
        );

        let mut incumbent = Incumbent::new(self.config.objective, root.clone());
        if let Some(sender) = &self.improvements {
            incumbent = incumbent.with_improvement_sender(sender.clone());
        }
        let actor = IncumbentActor::spawn(incumbent)?;

        let cluster = match Cluster::spawn(self.context()) {
            Ok(cluster) => cluster,
            Err(e) => {
                let _ = actor.shutdown();
                return Err(e);
            }
        };

        let outcome = drive(cluster.fabric(), actor.handle(), space, root);
        let localities = cluster.fabric().collect_statistics();
        cluster.shutdown();
        let best = actor.shutdown();

        outcome?;
        let statistics = SearchStatistics {
            duration: start.elapsed(),
            localities: localities?,
            max_depth: self.config.max_stats_depth,
        };
        let outcome = SearchOutcome { best: best?, statistics };

        info!(
            event = "search_end",
            bound = ?outcome.bound(),
            nodes = outcome.statistics.total_nodes(),
            pruned = outcome.statistics.total_pruned(),
            steals = outcome.statistics.steals_granted(),
            peak_workers = outcome.statistics.peak_workers(),
            duration_ms = outcome.statistics.duration.as_millis() as u64,
        );
        Ok(outcome)
    }
}

/// Bootstraps every locality, runs the root task and stops the schedulers.
fn drive<G: Generator>(
    fabric: &Fabric<G>,
    incumbent: IncumbentHandle<G::Node>,
    space: G::Space,
    root: G::Node,
) -> Result<()> {
    let bound = root.objective();
    for locality in fabric.iter() {
        locality.init_registry(space.clone(), root.clone(), bound, incumbent.clone())?;
    }

    let result = fabric.start_schedulers().and_then(|()| {
        let (handle, future) = completion();
        fabric.get(0)?.add_work(TaskDescriptor::root(handle))?;
        future.wait()
    });

    result.and(fabric.stop_schedulers())
}
