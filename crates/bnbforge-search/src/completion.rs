//! One-shot completion handles linking a task to whoever waits on it.
//!
//! A task is fulfilled exactly once. Dropping a [`CompletionHandle`] without
//! calling [`CompletionHandle::complete`] (a panicking worker) surfaces as
//! [`BnbError::TaskLost`] on the waiting side, so a parent never hangs on a
//! descendant that died.

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};

use bnbforge_core::{BnbError, Result};

/// Outcome reported by a finished task.
pub type TaskResult = Result<()>;

/// Creates a connected completion handle and future.
pub fn completion() -> (CompletionHandle, CompletionFuture) {
    let (tx, rx) = channel::bounded(1);
    (CompletionHandle { tx }, CompletionFuture { rx })
}

/// Sending half: fulfilled by the task when it and all of its stolen
/// descendants are finished.
#[derive(Debug)]
pub struct CompletionHandle {
    tx: Sender<TaskResult>,
}

impl CompletionHandle {
    /// Reports the task outcome. Consumes the handle.
    pub fn complete(self, result: TaskResult) {
        // The waiter may already be gone after an aborted search.
        let _ = self.tx.send(result);
    }
}

/// Receiving half: the future a parent task or the search root waits on.
#[derive(Debug)]
pub struct CompletionFuture {
    rx: Receiver<TaskResult>,
}

impl CompletionFuture {
    /// Blocks until the task reports its outcome.
    pub fn wait(self) -> TaskResult {
        self.rx.recv().unwrap_or(Err(BnbError::TaskLost))
    }

    /// Returns the outcome if the task already finished.
    pub fn try_wait(&self) -> Option<TaskResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(BnbError::TaskLost)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_complete_then_wait() {
        let (handle, future) = completion();
        assert!(future.try_wait().is_none());
        handle.complete(Ok(()));
        assert_eq!(future.wait(), Ok(()));
    }

    #[test]
    fn test_error_is_forwarded() {
        let (handle, future) = completion();
        handle.complete(Err(BnbError::plugin("boom")));
        assert_eq!(future.wait(), Err(BnbError::Plugin("boom".to_string())));
    }

    #[test]
    fn test_dropped_handle_is_task_lost() {
        let (handle, future) = completion();
        drop(handle);
        assert_eq!(future.wait(), Err(BnbError::TaskLost));
    }

    #[test]
    fn test_wait_across_threads() {
        let (handle, future) = completion();
        let worker = thread::spawn(move || handle.complete(Ok(())));
        assert_eq!(future.wait(), Ok(()));
        worker.join().unwrap();
    }
}
