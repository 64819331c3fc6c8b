//! Simulated localities and the message fabric connecting them.
//!
//! A locality is a mailbox thread owning one [`SearchManager`], one
//! [`Registry`] and one scheduler. Localities never share memory with each
//! other: every cross-locality interaction (bootstrap, bound broadcasts,
//! remote steals, statistics collection) is a message sent through a
//! [`LocalityHandle`]. Requests that need an answer carry their own reply
//! channel.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, warn};

use bnbforge_core::{BnbError, BoundFunction, Generator, Result, SearchNode};

use crate::bnb::{SearchContext, Worker};
use crate::incumbent::IncumbentHandle;
use crate::registry::Registry;
use crate::scheduler::{Scheduler, SchedulerHandle};
use crate::semaphore::TaskSemaphore;
use crate::stats::{LocalityCounters, LocalityStatistics};
use crate::work_queue::{SearchManager, TaskDescriptor};

type Bound<G> = <<G as Generator>::Node as SearchNode>::Bound;

/// Control-plane messages understood by a locality.
pub enum LocalityMessage<G: Generator> {
    /// Builds (or rebuilds) the locality's registry.
    InitRegistry {
        space: G::Space,
        root: G::Node,
        bound: Bound<G>,
        incumbent: IncumbentHandle<G::Node>,
        ack: Sender<()>,
    },
    /// Applies a bound if it beats the local one.
    UpdateRegistryBound(Bound<G>),
    /// Starts the locality's scheduler.
    StartScheduler {
        fabric: Fabric<G>,
        ack: Sender<Result<()>>,
    },
    /// Stops the scheduler; the reply carries its thread for joining.
    StopScheduler {
        ack: Sender<Option<JoinHandle<()>>>,
    },
    /// Steals one task from the locality's manager.
    Steal {
        reply: Sender<Option<TaskDescriptor>>,
    },
    /// Queues a task on the locality's manager.
    AddWork(TaskDescriptor),
    /// Snapshots the locality's counters.
    GetCounts { reply: Sender<LocalityStatistics> },
    /// Marks the search as failed.
    Abort,
    /// Ends the mailbox loop.
    Shutdown,
}

/// Address of one locality.
pub struct LocalityHandle<G: Generator> {
    id: usize,
    tx: Sender<LocalityMessage<G>>,
}

impl<G: Generator> Clone for LocalityHandle<G> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            tx: self.tx.clone(),
        }
    }
}

impl<G: Generator> std::fmt::Debug for LocalityHandle<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalityHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl<G: Generator> LocalityHandle<G> {
    pub(crate) fn new(id: usize, tx: Sender<LocalityMessage<G>>) -> Self {
        Self { id, tx }
    }

    /// Locality id.
    pub fn id(&self) -> usize {
        self.id
    }

    fn send(&self, message: LocalityMessage<G>) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| BnbError::LocalityUnavailable(self.id))
    }

    fn request<T>(&self, make: impl FnOnce(Sender<T>) -> LocalityMessage<G>) -> Result<T> {
        let (reply_tx, reply_rx) = channel::bounded(1);
        self.send(make(reply_tx))?;
        reply_rx
            .recv()
            .map_err(|_| BnbError::LocalityUnavailable(self.id))
    }

    /// Builds the locality's registry and waits until it is in place.
    pub fn init_registry(
        &self,
        space: G::Space,
        root: G::Node,
        bound: Bound<G>,
        incumbent: IncumbentHandle<G::Node>,
    ) -> Result<()> {
        self.request(|ack| LocalityMessage::InitRegistry {
            space,
            root,
            bound,
            incumbent,
            ack,
        })
    }

    /// Pushes a bound to the locality. Does not wait.
    pub fn update_bound(&self, bound: Bound<G>) -> Result<()> {
        self.send(LocalityMessage::UpdateRegistryBound(bound))
    }

    /// Starts the locality's scheduler with the given view of all peers.
    pub fn start_scheduler(&self, fabric: Fabric<G>) -> Result<()> {
        self.request(|ack| LocalityMessage::StartScheduler { fabric, ack })?
    }

    /// Stops the locality's scheduler, returning its thread if one ran.
    pub fn stop_scheduler(&self) -> Result<Option<JoinHandle<()>>> {
        self.request(|ack| LocalityMessage::StopScheduler { ack })
    }

    /// Steals a task from the locality; `None` if it has no work.
    pub fn steal(&self) -> Result<Option<TaskDescriptor>> {
        self.request(|reply| LocalityMessage::Steal { reply })
    }

    /// Queues a task on the locality. Does not wait.
    pub fn add_work(&self, task: TaskDescriptor) -> Result<()> {
        self.send(LocalityMessage::AddWork(task))
    }

    /// Reads the locality's counters.
    pub fn statistics(&self) -> Result<LocalityStatistics> {
        self.request(|reply| LocalityMessage::GetCounts { reply })
    }

    /// Tells the locality the search failed.
    pub fn abort(&self) -> Result<()> {
        self.send(LocalityMessage::Abort)
    }

    fn shutdown(&self) {
        let _ = self.tx.send(LocalityMessage::Shutdown);
    }
}

/// Handles to every locality of a search, indexed by id.
pub struct Fabric<G: Generator> {
    localities: Arc<[LocalityHandle<G>]>,
}

impl<G: Generator> Clone for Fabric<G> {
    fn clone(&self) -> Self {
        Self {
            localities: Arc::clone(&self.localities),
        }
    }
}

impl<G: Generator> std::fmt::Debug for Fabric<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.localities.iter()).finish()
    }
}

impl<G: Generator> Fabric<G> {
    pub(crate) fn from_handles(handles: Vec<LocalityHandle<G>>) -> Self {
        Self {
            localities: handles.into(),
        }
    }

    /// Number of localities.
    pub fn len(&self) -> usize {
        self.localities.len()
    }

    /// Returns true if there are no localities.
    pub fn is_empty(&self) -> bool {
        self.localities.is_empty()
    }

    /// Handle of locality `id`.
    pub fn get(&self, id: usize) -> Result<&LocalityHandle<G>> {
        self.localities
            .get(id)
            .ok_or(BnbError::LocalityUnavailable(id))
    }

    /// Iterates over all localities.
    pub fn iter(&self) -> impl Iterator<Item = &LocalityHandle<G>> {
        self.localities.iter()
    }

    /// Sends `bound` to every locality except `from`.
    pub fn broadcast_bound(&self, from: usize, bound: Bound<G>) -> Result<()> {
        self.iter()
            .filter(|locality| locality.id != from)
            .try_for_each(|locality| locality.update_bound(bound))
    }

    /// Tells every reachable locality that the search failed.
    pub fn broadcast_abort(&self) {
        for locality in self.iter() {
            if locality.abort().is_err() {
                warn!(event = "abort_undelivered", locality = locality.id);
            }
        }
    }

    /// Starts every scheduler.
    pub fn start_schedulers(&self) -> Result<()> {
        self.iter()
            .try_for_each(|locality| locality.start_scheduler(self.clone()))
    }

    /// Stops every scheduler and waits for all of them to exit.
    ///
    /// The stop request reaches every locality before any thread is joined.
    pub fn stop_schedulers(&self) -> Result<()> {
        let mut outcome = Ok(());
        let mut threads = Vec::new();
        for locality in self.iter() {
            match locality.stop_scheduler() {
                Ok(thread) => threads.extend(thread),
                Err(e) => {
                    if outcome.is_ok() {
                        outcome = Err(e);
                    }
                }
            }
        }
        for thread in threads {
            if thread.join().is_err() && outcome.is_ok() {
                outcome = Err(BnbError::Runtime("scheduler thread panicked".to_string()));
            }
        }
        outcome
    }

    /// Collects counters from every locality, ordered by id.
    pub fn collect_statistics(&self) -> Result<Vec<LocalityStatistics>> {
        self.iter().map(LocalityHandle::statistics).collect()
    }
}

/// The running set of localities of one search.
#[derive(Debug)]
pub struct Cluster<G: Generator> {
    fabric: Fabric<G>,
    threads: Vec<JoinHandle<()>>,
}

impl<G: Generator> Cluster<G> {
    /// Starts `context.config.localities` mailbox threads.
    pub fn spawn<F>(context: Arc<SearchContext<G, F>>) -> Result<Self>
    where
        F: BoundFunction<G::Space, G::Node>,
    {
        let count = context.config.localities;
        let mut handles = Vec::with_capacity(count);
        let mut threads = Vec::with_capacity(count);

        for id in 0..count {
            let (tx, rx) = channel::unbounded();
            let mailbox = Mailbox::new(id, Arc::clone(&context));
            let spawned = thread::Builder::new()
                .name(format!("bnb-locality-{id}"))
                .spawn(move || mailbox.run(rx));
            match spawned {
                Ok(thread) => {
                    handles.push(LocalityHandle::new(id, tx));
                    threads.push(thread);
                }
                Err(e) => {
                    let partial = Self {
                        fabric: Fabric::from_handles(handles),
                        threads,
                    };
                    partial.shutdown();
                    return Err(BnbError::Runtime(e.to_string()));
                }
            }
        }

        Ok(Self {
            fabric: Fabric::from_handles(handles),
            threads,
        })
    }

    /// Handles to every locality.
    pub fn fabric(&self) -> &Fabric<G> {
        &self.fabric
    }

    /// Ends every mailbox loop and joins the threads.
    pub fn shutdown(self) {
        for locality in self.fabric.iter() {
            locality.shutdown();
        }
        for thread in self.threads {
            let _ = thread.join();
        }
    }
}

/// State owned by a locality's mailbox thread.
struct Mailbox<G: Generator, F> {
    id: usize,
    context: Arc<SearchContext<G, F>>,
    manager: Arc<SearchManager>,
    counters: Arc<LocalityCounters>,
    registry: Option<Arc<Registry<G::Space, G::Node>>>,
    scheduler: Option<SchedulerHandle>,
}

impl<G, F> Mailbox<G, F>
where
    G: Generator,
    F: BoundFunction<G::Space, G::Node>,
{
    fn new(id: usize, context: Arc<SearchContext<G, F>>) -> Self {
        let config = &context.config;
        let manager = Arc::new(SearchManager::new(id, config.random_seed));
        let counters = Arc::new(LocalityCounters::new(config.max_stats_depth));
        Self {
            id,
            context,
            manager,
            counters,
            registry: None,
            scheduler: None,
        }
    }

    fn run(mut self, rx: Receiver<LocalityMessage<G>>) {
        for message in rx.iter() {
            match message {
                LocalityMessage::InitRegistry {
                    space,
                    root,
                    bound,
                    incumbent,
                    ack,
                } => {
                    let objective = self.context.config.objective;
                    self.registry = Some(Arc::new(Registry::new(
                        space, root, objective, bound, incumbent,
                    )));
                    let _ = ack.send(());
                }
                LocalityMessage::UpdateRegistryBound(bound) => {
                    if let Some(registry) = &self.registry {
                        registry.update_bound(bound);
                    }
                }
                LocalityMessage::StartScheduler { fabric, ack } => {
                    let _ = ack.send(self.start_scheduler(fabric));
                }
                LocalityMessage::StopScheduler { ack } => {
                    let _ = ack.send(self.scheduler.take().map(SchedulerHandle::stop));
                }
                LocalityMessage::Steal { reply } => {
                    let _ = reply.send(self.manager.steal());
                }
                LocalityMessage::AddWork(task) => self.manager.add_work(task),
                LocalityMessage::GetCounts { reply } => {
                    let _ = reply.send(self.counters.snapshot(self.id));
                }
                LocalityMessage::Abort => {
                    if let Some(registry) = &self.registry {
                        registry.abort();
                    }
                }
                LocalityMessage::Shutdown => break,
            }
        }

        if let Some(scheduler) = self.scheduler.take() {
            let _ = scheduler.stop().join();
        }
        debug!(event = "locality_stop", locality = self.id);
    }

    fn start_scheduler(&mut self, fabric: Fabric<G>) -> Result<()> {
        if self.scheduler.is_some() {
            return Ok(());
        }
        let registry = self.registry.clone().ok_or_else(|| {
            BnbError::Runtime(format!("locality {} has no registry", self.id))
        })?;

        let config = &self.context.config;
        let semaphore = TaskSemaphore::new(config.dispatch_slots());
        let worker = Worker::new(
            self.id,
            Arc::clone(&self.context),
            registry,
            Arc::clone(&self.manager),
            Arc::clone(&self.counters),
            fabric.clone(),
            semaphore.clone(),
        );
        let scheduler = Scheduler::new(
            self.id,
            config,
            Arc::clone(&self.manager),
            Arc::clone(&self.counters),
            fabric,
            semaphore,
        );
        self.scheduler = Some(scheduler.spawn(Arc::new(worker))?);
        Ok(())
    }
}
