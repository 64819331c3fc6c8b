//! Per-locality dispatch loop.
//!
//! The scheduler takes a permit from the locality's [`TaskSemaphore`], then
//! looks for work: the local [`SearchManager`] first, then the last peer that
//! gave it work, then a random peer. A task found anywhere is handed to a
//! fresh worker thread and keeps its permit until the worker returns it.
//! With nothing found, the scheduler backs off briefly and returns the
//! permit itself.
//!
//! Only requests sent to a peer count as steals in the statistics; work
//! taken from the local manager and idle rounds are counted separately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, error, trace, warn};

use bnbforge_config::SearchConfig;
use bnbforge_core::{BnbError, Generator, Result};

use crate::locality::Fabric;
use crate::semaphore::TaskSemaphore;
use crate::stats::LocalityCounters;
use crate::work_queue::{SearchManager, TaskDescriptor, TaskSlot};

/// Executes one dispatched task on the current thread.
///
/// The runner owns the task from here on: it must call
/// [`SearchManager::done`] for `slot`, return the dispatch permit, and
/// fulfil the task's completion handle.
pub trait TaskRunner: Send + Sync + 'static {
    /// Runs `task`, registered under `slot`.
    fn run(&self, task: TaskDescriptor, slot: TaskSlot);
}

/// Dispatch loop of one locality, before it is started.
pub struct Scheduler<G: Generator> {
    locality: usize,
    manager: Arc<SearchManager>,
    counters: Arc<LocalityCounters>,
    fabric: Fabric<G>,
    semaphore: TaskSemaphore,
    running: Arc<AtomicBool>,
    rng: ChaCha8Rng,
    last_remote: Option<usize>,
    idle_backoff: Duration,
    stack_size: Option<usize>,
}

/// Handle to a started scheduler.
#[derive(Debug)]
pub struct SchedulerHandle {
    running: Arc<AtomicBool>,
    semaphore: TaskSemaphore,
    thread: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Clears the running flag and wakes the loop so it can exit.
    ///
    /// Returns the scheduler thread; joining it waits for every worker the
    /// scheduler started.
    pub fn stop(self) -> JoinHandle<()> {
        self.running.store(false, Ordering::Release);
        self.semaphore.signal();
        self.thread
    }
}

impl<G: Generator> Scheduler<G> {
    /// Creates a scheduler for `locality`.
    pub fn new(
        locality: usize,
        config: &SearchConfig,
        manager: Arc<SearchManager>,
        counters: Arc<LocalityCounters>,
        fabric: Fabric<G>,
        semaphore: TaskSemaphore,
    ) -> Self {
        let mut rng = match config.random_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };
        rng.set_stream(locality as u64);

        Self {
            locality,
            manager,
            counters,
            fabric,
            semaphore,
            running: Arc::new(AtomicBool::new(true)),
            rng,
            last_remote: None,
            idle_backoff: config.idle_backoff(),
            stack_size: config.worker_stack_size,
        }
    }

    /// Starts the loop on its own thread.
    pub fn spawn<R: TaskRunner>(self, runner: Arc<R>) -> Result<SchedulerHandle> {
        let running = Arc::clone(&self.running);
        let semaphore = self.semaphore.clone();
        let thread = thread::Builder::new()
            .name(format!("bnb-scheduler-{}", self.locality))
            .spawn(move || self.run(runner))
            .map_err(|e| BnbError::Runtime(e.to_string()))?;
        Ok(SchedulerHandle {
            running,
            semaphore,
            thread,
        })
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn run<R: TaskRunner>(mut self, runner: Arc<R>) {
        debug!(event = "scheduler_start", locality = self.locality);
        let mut workers: Vec<JoinHandle<()>> = Vec::new();

        loop {
            self.semaphore.wait();
            if !self.is_running() {
                break;
            }

            match self.find_work() {
                Some(task) => {
                    workers.retain(|worker| !worker.is_finished());
                    if let Some(worker) = self.dispatch(task, &runner) {
                        workers.push(worker);
                        self.counters.record_live_workers(workers.len());
                    }
                }
                None => {
                    self.counters.record_idle_poll();
                    trace!(event = "idle_backoff", locality = self.locality);
                    thread::sleep(self.idle_backoff);
                    self.semaphore.signal();
                }
            }
        }

        for worker in workers {
            let _ = worker.join();
        }
        debug!(event = "scheduler_stop", locality = self.locality);
    }

    /// Local work first, then the last fruitful peer, then a random one.
    fn find_work(&mut self) -> Option<TaskDescriptor> {
        if let Some(task) = self.manager.steal() {
            self.counters.record_local_dispatch();
            return Some(task);
        }

        let peers = self.fabric.len();
        if peers <= 1 || !self.is_running() {
            return None;
        }

        if let Some(peer) = self.last_remote {
            if let Some(task) = self.steal_from(peer) {
                return Some(task);
            }
            self.last_remote = None;
        }

        let mut peer = self.rng.random_range(0..peers - 1);
        if peer >= self.locality {
            peer += 1;
        }
        let task = self.steal_from(peer)?;
        self.last_remote = Some(peer);
        Some(task)
    }

    fn steal_from(&self, peer: usize) -> Option<TaskDescriptor> {
        let stolen = match self.fabric.get(peer).and_then(|handle| handle.steal()) {
            Ok(stolen) => stolen,
            Err(e) => {
                warn!(
                    event = "steal_failed",
                    locality = self.locality,
                    peer,
                    error = %e,
                );
                None
            }
        };
        self.counters.record_steal(stolen.is_some());
        trace!(
            event = "remote_steal",
            locality = self.locality,
            peer,
            granted = stolen.is_some(),
        );
        stolen
    }

    /// Registers `task` and starts a worker thread for it.
    fn dispatch<R: TaskRunner>(
        &self,
        task: TaskDescriptor,
        runner: &Arc<R>,
    ) -> Option<JoinHandle<()>> {
        let slot = self.manager.register();
        let index = slot.index;
        self.counters.record_task();

        let mut builder =
            thread::Builder::new().name(format!("bnb-worker-{}-{}", self.locality, index));
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }
        let runner = Arc::clone(runner);
        match builder.spawn(move || runner.run(task, slot)) {
            Ok(worker) => Some(worker),
            Err(e) => {
                // The task's completion handle dropped with the closure, so
                // its waiter sees the task as lost.
                error!(
                    event = "worker_spawn_failed",
                    locality = self.locality,
                    error = %e,
                );
                self.manager.done(index);
                self.semaphore.signal();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests;
