//! Per-locality search manager: the store of stealable work.
//!
//! A manager answers two kinds of callers. Task producers hand it new work
//! with [`SearchManager::add_work`]. Schedulers, local or remote, ask it for
//! work with [`SearchManager::steal`], which first pops a queued task and
//! otherwise splits one of the tasks currently running on this locality
//! through that task's steal rendezvous. All queue mutations are serialized
//! by one lock, so a task handed out once is never handed out again.

use std::collections::{BTreeMap, VecDeque};
use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use bnbforge_core::Path;

use crate::completion::CompletionHandle;
use crate::shared::SharedState;

/// A unit of stealable work.
///
/// The task explores the children at positions `window` of the node named by
/// `path`, and everything below them. `depth` is the tree depth of those
/// children.
#[derive(Debug)]
pub struct TaskDescriptor {
    /// Location of the node whose children this task explores.
    pub path: Path,
    /// Depth of the explored children (1 for the root task).
    pub depth: usize,
    /// Child positions granted to this task.
    pub window: Range<usize>,
    /// Fulfilled once the task and all of its stolen descendants finish.
    pub completion: CompletionHandle,
}

impl TaskDescriptor {
    /// Creates a task over `window` of the children of `path`.
    pub fn new(path: Path, window: Range<usize>, completion: CompletionHandle) -> Self {
        Self {
            depth: path.depth() + 1,
            path,
            window,
            completion,
        }
    }

    /// The task covering the whole tree.
    pub fn root(completion: CompletionHandle) -> Self {
        Self::new(Path::root(), 0..usize::MAX, completion)
    }
}

/// Registration of a running task with its manager.
#[derive(Debug, Clone)]
pub struct TaskSlot {
    /// Slot index, passed back to [`SearchManager::done`].
    pub index: usize,
    /// Steal rendezvous of the task.
    pub shared: Arc<SharedState>,
}

/// Stealable work of one locality.
#[derive(Debug)]
pub struct SearchManager {
    locality: usize,
    state: Mutex<ManagerState>,
}

#[derive(Debug)]
struct ManagerState {
    pending: VecDeque<TaskDescriptor>,
    active: BTreeMap<usize, Arc<SharedState>>,
    next_slot: usize,
    rng: ChaCha8Rng,
}

impl SearchManager {
    /// Creates an empty manager for `locality`.
    ///
    /// `seed` makes the choice of which running task to split reproducible.
    pub fn new(locality: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed.wrapping_add(locality as u64)),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };
        Self {
            locality,
            state: Mutex::new(ManagerState {
                pending: VecDeque::new(),
                active: BTreeMap::new(),
                next_slot: 0,
                rng,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the locality this manager belongs to.
    pub fn locality(&self) -> usize {
        self.locality
    }

    /// Enqueues a new task. Returns immediately.
    pub fn add_work(&self, task: TaskDescriptor) {
        self.lock().pending.push_back(task);
    }

    /// Hands out one task, or `None` if this locality has nothing to give.
    ///
    /// Queued tasks are returned first. Otherwise a running task is picked at
    /// random and asked to split; this blocks until that task reaches its
    /// next checkpoint or finishes.
    pub fn steal(&self) -> Option<TaskDescriptor> {
        let victim = {
            let mut state = self.lock();
            if let Some(task) = state.pending.pop_front() {
                return Some(task);
            }
            let count = state.active.len();
            if count == 0 {
                return None;
            }
            let start = state.rng.random_range(0..count);
            let victim = state
                .active
                .values()
                .cycle()
                .skip(start)
                .take(count)
                .find(|shared| shared.try_request())
                .cloned();
            victim?
        };

        trace!(
            event = "steal_wait",
            locality = self.locality,
            "waiting for running task to split"
        );
        victim.await_response()
    }

    /// Registers a task that is about to start running here.
    pub fn register(&self) -> TaskSlot {
        let mut state = self.lock();
        let index = state.next_slot;
        state.next_slot += 1;
        let shared = Arc::new(SharedState::new());
        state.active.insert(index, Arc::clone(&shared));
        TaskSlot { index, shared }
    }

    /// Marks the task in slot `index` as finished expanding.
    ///
    /// A thief still waiting on the task is answered with "no work".
    pub fn done(&self, index: usize) {
        let shared = self.lock().active.remove(&index);
        if let Some(shared) = shared {
            shared.retire();
        }
    }

    /// Number of queued tasks.
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Number of registered, still expanding tasks.
    pub fn active_len(&self) -> usize {
        self.lock().active.len()
    }

    /// Queued plus running tasks.
    pub fn outstanding(&self) -> usize {
        let state = self.lock();
        state.pending.len() + state.active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::completion;
    use std::thread;

    fn task(step: usize) -> TaskDescriptor {
        let (handle, _future) = completion();
        TaskDescriptor::new(Path::from_steps([step]), 0..usize::MAX, handle)
    }

    #[test]
    fn test_root_descriptor() {
        let (handle, _future) = completion();
        let root = TaskDescriptor::root(handle);
        assert!(root.path.is_root());
        assert_eq!(root.depth, 1);
        assert_eq!(root.window.start, 0);
    }

    #[test]
    fn test_empty_manager_steal_is_none() {
        let manager = SearchManager::new(0, Some(1));
        assert!(manager.steal().is_none());
        assert_eq!(manager.outstanding(), 0);
    }

    #[test]
    fn test_pending_tasks_handed_out_once_in_order() {
        let manager = SearchManager::new(0, Some(1));
        manager.add_work(task(1));
        manager.add_work(task(2));
        assert_eq!(manager.pending_len(), 2);

        assert_eq!(manager.steal().unwrap().path, Path::from_steps([1]));
        assert_eq!(manager.steal().unwrap().path, Path::from_steps([2]));
        assert!(manager.steal().is_none());
    }

    #[test]
    fn test_register_and_done() {
        let manager = SearchManager::new(3, None);
        let a = manager.register();
        let b = manager.register();
        assert_ne!(a.index, b.index);
        assert_eq!(manager.active_len(), 2);
        assert_eq!(manager.locality(), 3);

        manager.done(a.index);
        manager.done(a.index);
        assert_eq!(manager.active_len(), 1);
        manager.done(b.index);
        assert_eq!(manager.outstanding(), 0);
    }

    #[test]
    fn test_steal_from_running_task() {
        let manager = Arc::new(SearchManager::new(0, Some(9)));
        let slot = manager.register();

        let thief = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.steal())
        };

        // The running task polls its checkpoint until the thief shows up.
        while !slot.shared.serve(|| Some(task(4))) {
            thread::yield_now();
        }

        let stolen = thief.join().unwrap().expect("split work");
        assert_eq!(stolen.path, Path::from_steps([4]));
    }

    #[test]
    fn test_done_answers_waiting_thief() {
        let manager = Arc::new(SearchManager::new(0, Some(9)));
        let slot = manager.register();

        let thief = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.steal())
        };

        while !slot.shared.is_requested() {
            thread::yield_now();
        }
        manager.done(slot.index);

        assert!(thief.join().unwrap().is_none());
    }
}
