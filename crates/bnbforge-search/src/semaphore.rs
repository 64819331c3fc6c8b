//! Counting semaphore throttling how many tasks a locality dispatches.
//!
//! Permits are unit tokens in a channel: `signal` adds one, `wait` blocks
//! until one can be taken. Any number of clones share the same pool.

use crossbeam::channel::{self, Receiver, Sender};

/// A clonable counting semaphore.
#[derive(Debug, Clone)]
pub struct TaskSemaphore {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl TaskSemaphore {
    /// Creates a semaphore holding `permits` permits.
    pub fn new(permits: usize) -> Self {
        let (tx, rx) = channel::unbounded();
        let semaphore = Self { tx, rx };
        semaphore.signal_n(permits);
        semaphore
    }

    /// Blocks until a permit is available and takes it.
    pub fn wait(&self) {
        // Both halves live in `self`, so the channel cannot disconnect.
        let _ = self.rx.recv();
    }

    /// Takes a permit if one is available.
    pub fn try_wait(&self) -> bool {
        self.rx.try_recv().is_ok()
    }

    /// Returns one permit.
    pub fn signal(&self) {
        let _ = self.tx.send(());
    }

    /// Returns `n` permits.
    pub fn signal_n(&self, n: usize) {
        for _ in 0..n {
            self.signal();
        }
    }

    /// Number of permits currently available.
    pub fn available(&self) -> usize {
        self.rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_permit_accounting() {
        let sem = TaskSemaphore::new(2);
        assert_eq!(sem.available(), 2);
        sem.wait();
        assert!(sem.try_wait());
        assert!(!sem.try_wait());
        sem.signal();
        assert_eq!(sem.available(), 1);
    }

    #[test]
    fn test_wait_unblocks_on_signal() {
        let sem = TaskSemaphore::new(0);
        let waiter = {
            let sem = sem.clone();
            thread::spawn(move || sem.wait())
        };
        thread::sleep(Duration::from_millis(10));
        sem.signal();
        waiter.join().unwrap();
        assert_eq!(sem.available(), 0);
    }
}
