//! Per-task steal rendezvous.
//!
//! Every running task owns one [`SharedState`]: an atomic "steal requested"
//! flag plus a single-slot channel. A thief raises the flag and blocks on the
//! channel; the task answers at its next checkpoint (the entry of a node
//! expansion) or, if it finishes first, answers with "no work" when it
//! retires. Each raised flag is answered exactly once.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::channel::{self, Receiver, Sender};

use crate::work_queue::TaskDescriptor;

/// Answer to a steal request: a granted task, or `None` for "no work".
pub type StealResponse = Option<TaskDescriptor>;

/// Steal flag and response slot shared between a task and its thieves.
#[derive(Debug)]
pub struct SharedState {
    requested: AtomicBool,
    tx: Sender<StealResponse>,
    rx: Receiver<StealResponse>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    /// Creates an idle rendezvous.
    pub fn new() -> Self {
        let (tx, rx) = channel::bounded(1);
        Self {
            requested: AtomicBool::new(false),
            tx,
            rx,
        }
    }

    /// Returns true if a thief is waiting for an answer.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Raises the steal flag. Fails if another thief already holds it.
    pub(crate) fn try_request(&self) -> bool {
        self.requested
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Blocks until the owning task answers a raised flag.
    pub(crate) fn await_response(&self) -> StealResponse {
        self.rx.recv().ok().flatten()
    }

    /// Checkpoint: if a steal is pending, computes and publishes the answer,
    /// then clears the flag. Only the owning task calls this.
    ///
    /// Returns true if a request was served.
    pub fn serve(&self, respond: impl FnOnce() -> StealResponse) -> bool {
        if !self.is_requested() {
            return false;
        }
        // The flag stays raised until the answer is in the slot, so no
        // second thief can slip in and wait on the same answer.
        let _ = self.tx.send(respond());
        self.requested.store(false, Ordering::Release);
        true
    }

    /// Answers a pending request with "no work". Called once the task has
    /// been removed from its search manager, so no new request can arrive.
    pub(crate) fn retire(&self) -> bool {
        self.serve(|| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::completion;
    use bnbforge_core::Path;
    use std::sync::Arc;
    use std::thread;

    fn descriptor() -> TaskDescriptor {
        let (handle, _future) = completion();
        TaskDescriptor::new(Path::from_steps([1]), 0..1, handle)
    }

    #[test]
    fn test_serve_without_request_is_noop() {
        let shared = SharedState::new();
        let mut called = false;
        assert!(!shared.serve(|| {
            called = true;
            None
        }));
        assert!(!called);
    }

    #[test]
    fn test_only_one_thief_holds_the_flag() {
        let shared = SharedState::new();
        assert!(shared.try_request());
        assert!(!shared.try_request());
        assert!(shared.serve(|| None));
        assert!(!shared.is_requested());
        assert!(shared.try_request());
    }

    #[test]
    fn test_thief_receives_answer() {
        let shared = Arc::new(SharedState::new());
        assert!(shared.try_request());

        let thief = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || shared.await_response())
        };

        assert!(shared.serve(|| Some(descriptor())));
        let response = thief.join().unwrap().expect("granted work");
        assert_eq!(response.path, Path::from_steps([1]));
        assert!(!shared.is_requested());
    }

    #[test]
    fn test_retire_answers_no_work() {
        let shared = SharedState::new();
        assert!(shared.try_request());
        assert!(shared.retire());
        assert!(shared.await_response().is_none());
        assert!(!shared.retire());
    }
}
