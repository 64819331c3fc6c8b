//! Tests for the dispatch loop.

use std::sync::Mutex;
use std::thread;

use crossbeam::channel;

use bnbforge_core::Path;
use bnbforge_test::BinaryTree;

use super::*;
use crate::completion::completion;
use crate::locality::{LocalityHandle, LocalityMessage};

/// Runner that records each task and finishes it right away.
struct RecordingRunner {
    manager: Arc<SearchManager>,
    semaphore: TaskSemaphore,
    seen: Mutex<Vec<Path>>,
}

impl TaskRunner for RecordingRunner {
    fn run(&self, task: TaskDescriptor, slot: TaskSlot) {
        self.seen.lock().unwrap().push(task.path.clone());
        self.manager.done(slot.index);
        self.semaphore.signal();
        task.completion.complete(Ok(()));
    }
}

fn config() -> SearchConfig {
    SearchConfig::new()
        .with_threads_per_locality(3)
        .with_random_seed(5)
        .with_idle_backoff_micros(50)
}

fn sorted_paths(runner: &RecordingRunner) -> Vec<Path> {
    let mut seen = runner.seen.lock().unwrap().clone();
    seen.sort_by(|a, b| a.as_slice().cmp(b.as_slice()));
    seen
}

#[test]
fn test_dispatches_local_work() {
    let config = config();
    let manager = Arc::new(SearchManager::new(0, config.random_seed));
    let counters = Arc::new(LocalityCounters::new(8));
    let semaphore = TaskSemaphore::new(config.dispatch_slots());
    let (tx, _rx) = channel::unbounded();
    let fabric = Fabric::<BinaryTree>::from_handles(vec![LocalityHandle::new(0, tx)]);

    let mut futures = Vec::new();
    for step in 0..4 {
        let (handle, future) = completion();
        manager.add_work(TaskDescriptor::new(Path::from_steps([step]), 0..1, handle));
        futures.push(future);
    }

    let runner = Arc::new(RecordingRunner {
        manager: Arc::clone(&manager),
        semaphore: semaphore.clone(),
        seen: Mutex::new(Vec::new()),
    });
    let scheduler = Scheduler::new(
        0,
        &config,
        Arc::clone(&manager),
        Arc::clone(&counters),
        fabric,
        semaphore.clone(),
    )
    .spawn(Arc::clone(&runner))
    .unwrap();

    for future in futures {
        assert_eq!(future.wait(), Ok(()));
    }
    scheduler.stop().join().unwrap();

    let expected: Vec<Path> = (0..4).map(|step| Path::from_steps([step])).collect();
    assert_eq!(sorted_paths(&runner), expected);
    let stats = counters.snapshot(0);
    assert_eq!(stats.tasks_executed, 4);
    assert_eq!(stats.local_dispatches, 4);
    // A single locality never sends steal requests, however long it idles.
    assert_eq!(stats.steals_attempted, 0);
    assert!((1..=4).contains(&stats.peak_workers));
    assert_eq!(manager.outstanding(), 0);
    assert_eq!(semaphore.available(), config.dispatch_slots());
}

#[test]
fn test_steals_from_remote_peer() {
    let config = config();
    let manager = Arc::new(SearchManager::new(0, config.random_seed));
    let counters = Arc::new(LocalityCounters::new(8));
    let semaphore = TaskSemaphore::new(config.dispatch_slots());
    let (tx0, _rx0) = channel::unbounded();
    let (tx1, rx1) = channel::unbounded::<LocalityMessage<BinaryTree>>();
    let fabric = Fabric::from_handles(vec![
        LocalityHandle::new(0, tx0),
        LocalityHandle::new(1, tx1.clone()),
    ]);

    // Locality 1 holds two tasks and gives them away one steal at a time.
    let mut futures = Vec::new();
    let mut remote_work = Vec::new();
    for step in [7, 8] {
        let (handle, future) = completion();
        remote_work.push(TaskDescriptor::new(Path::from_steps([step]), 0..1, handle));
        futures.push(future);
    }
    let peer = thread::spawn(move || {
        for message in rx1.iter() {
            match message {
                LocalityMessage::Steal { reply } => {
                    let _ = reply.send(remote_work.pop());
                }
                LocalityMessage::Shutdown => break,
                _ => {}
            }
        }
    });

    let runner = Arc::new(RecordingRunner {
        manager: Arc::clone(&manager),
        semaphore: semaphore.clone(),
        seen: Mutex::new(Vec::new()),
    });
    let scheduler = Scheduler::new(
        0,
        &config,
        Arc::clone(&manager),
        Arc::clone(&counters),
        fabric,
        semaphore,
    )
    .spawn(Arc::clone(&runner))
    .unwrap();

    for future in futures {
        assert_eq!(future.wait(), Ok(()));
    }
    scheduler.stop().join().unwrap();
    tx1.send(LocalityMessage::Shutdown).unwrap();
    peer.join().unwrap();

    assert_eq!(
        sorted_paths(&runner),
        vec![Path::from_steps([7]), Path::from_steps([8])]
    );
    let stats = counters.snapshot(0);
    assert_eq!(stats.steals_granted, 2);
    assert!(stats.steals_attempted >= 2);
    assert_eq!(stats.local_dispatches, 0);
    assert_eq!(stats.tasks_executed, 2);
}
