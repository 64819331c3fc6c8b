//! Search statistics collection and reporting.
//!
//! Every locality keeps lock-free counters that workers bump while
//! expanding. At the end of a search the orchestrator collects a
//! [`LocalityStatistics`] snapshot from each locality and folds them into a
//! [`SearchStatistics`]. None of this is on the correctness path.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Expanded-node counts bucketed by tree depth.
///
/// Depths `0..=max_depth` each get a bucket; deeper nodes are folded into
/// the last one.
#[derive(Debug)]
pub struct NodeCounter {
    buckets: Vec<AtomicU64>,
}

impl NodeCounter {
    /// Creates a counter tracking depths up to `max_depth`.
    pub fn new(max_depth: usize) -> Self {
        Self {
            buckets: (0..=max_depth).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Records one node entered at `depth`.
    #[inline]
    pub fn record(&self, depth: usize) {
        let bucket = depth.min(self.buckets.len() - 1);
        self.buckets[bucket].fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the current counts.
    pub fn snapshot(&self) -> Vec<u64> {
        self.buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect()
    }
}

/// Live counters of one locality.
#[derive(Debug)]
pub struct LocalityCounters {
    /// Nodes entered, by depth.
    pub nodes: NodeCounter,
    pruned: AtomicU64,
    steals_attempted: AtomicU64,
    steals_granted: AtomicU64,
    local_dispatches: AtomicU64,
    idle_polls: AtomicU64,
    tasks_executed: AtomicU64,
    peak_workers: AtomicUsize,
}

impl LocalityCounters {
    /// Creates zeroed counters.
    pub fn new(max_depth: usize) -> Self {
        Self {
            nodes: NodeCounter::new(max_depth),
            pruned: AtomicU64::new(0),
            steals_attempted: AtomicU64::new(0),
            steals_granted: AtomicU64::new(0),
            local_dispatches: AtomicU64::new(0),
            idle_polls: AtomicU64::new(0),
            tasks_executed: AtomicU64::new(0),
            peak_workers: AtomicUsize::new(0),
        }
    }

    /// Records a child discarded by the bound test.
    #[inline]
    pub fn record_prune(&self) {
        self.pruned.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one steal request sent to a peer and whether it returned
    /// work.
    pub fn record_steal(&self, granted: bool) {
        self.steals_attempted.fetch_add(1, Ordering::Relaxed);
        if granted {
            self.steals_granted.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a task taken from the locality's own manager.
    pub fn record_local_dispatch(&self) {
        self.local_dispatches.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a scheduler round that found no work anywhere.
    pub fn record_idle_poll(&self) {
        self.idle_polls.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a task dispatched to a worker.
    pub fn record_task(&self) {
        self.tasks_executed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the number of worker threads alive after a dispatch.
    pub fn record_live_workers(&self, live: usize) {
        self.peak_workers.fetch_max(live, Ordering::Relaxed);
    }

    /// Takes a snapshot for `locality`.
    pub fn snapshot(&self, locality: usize) -> LocalityStatistics {
        LocalityStatistics {
            locality,
            node_counts: self.nodes.snapshot(),
            pruned: self.pruned.load(Ordering::Relaxed),
            steals_attempted: self.steals_attempted.load(Ordering::Relaxed),
            steals_granted: self.steals_granted.load(Ordering::Relaxed),
            local_dispatches: self.local_dispatches.load(Ordering::Relaxed),
            idle_polls: self.idle_polls.load(Ordering::Relaxed),
            tasks_executed: self.tasks_executed.load(Ordering::Relaxed),
            peak_workers: self.peak_workers.load(Ordering::Relaxed),
        }
    }
}

/// Counters of one locality at the end of a search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalityStatistics {
    /// Locality id.
    pub locality: usize,
    /// Nodes entered per depth.
    pub node_counts: Vec<u64>,
    /// Children discarded by the bound test.
    pub pruned: u64,
    /// Steal requests this locality's scheduler sent to peers.
    pub steals_attempted: u64,
    /// Remote steals that returned work.
    pub steals_granted: u64,
    /// Tasks taken from this locality's own manager.
    pub local_dispatches: u64,
    /// Scheduler rounds that found no work.
    pub idle_polls: u64,
    /// Tasks run by this locality's workers.
    pub tasks_executed: u64,
    /// Most worker threads alive at once, including tasks parked while
    /// joining stolen descendants.
    pub peak_workers: usize,
}

impl LocalityStatistics {
    /// Total nodes entered on this locality.
    pub fn nodes(&self) -> u64 {
        self.node_counts.iter().sum()
    }
}

/// Statistics of a whole search.
#[derive(Debug, Clone, Default)]
pub struct SearchStatistics {
    /// Wall time from bootstrap to teardown.
    pub duration: Duration,
    /// One entry per locality, ordered by locality id.
    pub localities: Vec<LocalityStatistics>,
    /// Deepest depth counted in its own bucket.
    pub max_depth: usize,
}

impl SearchStatistics {
    /// Per-depth node counts summed over every locality, root included.
    pub fn node_counts(&self) -> Vec<u64> {
        total_node_counts(&self.localities, self.max_depth)
    }

    /// Total nodes expanded, root included.
    pub fn total_nodes(&self) -> u64 {
        self.node_counts().iter().sum()
    }

    /// Total children discarded by the bound test.
    pub fn total_pruned(&self) -> u64 {
        self.localities.iter().map(|l| l.pruned).sum()
    }

    /// Total steal requests sent between localities.
    pub fn steals_attempted(&self) -> u64 {
        self.localities.iter().map(|l| l.steals_attempted).sum()
    }

    /// Total steals that returned work.
    pub fn steals_granted(&self) -> u64 {
        self.localities.iter().map(|l| l.steals_granted).sum()
    }

    /// Total tasks taken from a locality's own manager.
    pub fn local_dispatches(&self) -> u64 {
        self.localities.iter().map(|l| l.local_dispatches).sum()
    }

    /// Total scheduler rounds that found no work.
    pub fn idle_polls(&self) -> u64 {
        self.localities.iter().map(|l| l.idle_polls).sum()
    }

    /// Total tasks executed.
    pub fn tasks_executed(&self) -> u64 {
        self.localities.iter().map(|l| l.tasks_executed).sum()
    }

    /// Most worker threads any single locality had alive at once.
    pub fn peak_workers(&self) -> usize {
        self.localities
            .iter()
            .map(|l| l.peak_workers)
            .max()
            .unwrap_or(0)
    }

    /// Nodes expanded per second.
    pub fn nodes_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.total_nodes() as f64 / secs
        } else {
            0.0
        }
    }
}

/// Sums per-depth counts of every locality into `max_depth + 1` buckets,
/// one per depth `0..=max_depth`. Deeper counts fold into the last bucket.
///
/// Depth 0 is the root, which no task enters as a child, so it is always
/// reported as exactly one node.
///
/// # Examples
///
/// ```
/// use bnbforge_search::stats::{total_node_counts, LocalityStatistics};
///
/// let a = LocalityStatistics { node_counts: vec![0, 2, 1], ..Default::default() };
/// let b = LocalityStatistics { node_counts: vec![0, 0, 3], ..Default::default() };
/// assert_eq!(total_node_counts(&[a, b], 2), vec![1, 2, 4]);
/// ```
pub fn total_node_counts(localities: &[LocalityStatistics], max_depth: usize) -> Vec<u64> {
    let mut res = vec![0u64; max_depth + 1];
    for stats in localities {
        for (depth, count) in stats.node_counts.iter().enumerate() {
            let bucket = depth.min(res.len() - 1);
            res[bucket] += count;
        }
    }
    res[0] = 1;
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_node_counter_folds_deep_nodes() {
        let counter = NodeCounter::new(3);
        counter.record(1);
        counter.record(2);
        counter.record(3);
        counter.record(7);
        counter.record(40);
        assert_eq!(counter.snapshot(), vec![0, 1, 1, 3]);
    }

    #[test]
    fn test_node_counter_concurrent() {
        let counter = NodeCounter::new(3);
        (0..4000usize).into_par_iter().for_each(|i| counter.record(i % 4));
        assert_eq!(counter.snapshot(), vec![1000; 4]);
    }

    #[test]
    fn test_locality_snapshot() {
        let counters = LocalityCounters::new(4);
        counters.nodes.record(1);
        counters.record_prune();
        counters.record_steal(false);
        counters.record_steal(true);
        counters.record_local_dispatch();
        counters.record_idle_poll();
        counters.record_idle_poll();
        counters.record_task();
        counters.record_live_workers(3);
        counters.record_live_workers(1);

        let snap = counters.snapshot(2);
        assert_eq!(snap.locality, 2);
        assert_eq!(snap.nodes(), 1);
        assert_eq!(snap.pruned, 1);
        assert_eq!(snap.steals_attempted, 2);
        assert_eq!(snap.steals_granted, 1);
        assert_eq!(snap.local_dispatches, 1);
        assert_eq!(snap.idle_polls, 2);
        assert_eq!(snap.tasks_executed, 1);
        assert_eq!(snap.peak_workers, 3);
    }

    #[test]
    fn test_search_statistics_totals() {
        let stats = SearchStatistics {
            duration: Duration::from_secs(2),
            max_depth: 3,
            localities: vec![
                LocalityStatistics {
                    locality: 0,
                    node_counts: vec![0, 2, 2, 0],
                    pruned: 1,
                    steals_attempted: 3,
                    steals_granted: 1,
                    local_dispatches: 1,
                    idle_polls: 10,
                    tasks_executed: 2,
                    peak_workers: 2,
                },
                LocalityStatistics {
                    locality: 1,
                    node_counts: vec![0, 0, 2, 2],
                    pruned: 2,
                    steals_attempted: 1,
                    steals_granted: 1,
                    local_dispatches: 0,
                    idle_polls: 4,
                    tasks_executed: 1,
                    peak_workers: 5,
                },
            ],
        };
        assert_eq!(stats.node_counts(), vec![1, 2, 4, 2]);
        assert_eq!(stats.total_nodes(), 9);
        assert_eq!(stats.total_pruned(), 3);
        assert_eq!(stats.steals_attempted(), 4);
        assert_eq!(stats.steals_granted(), 2);
        assert_eq!(stats.local_dispatches(), 1);
        assert_eq!(stats.idle_polls(), 14);
        assert_eq!(stats.tasks_executed(), 3);
        assert_eq!(stats.peak_workers(), 5);
        assert_eq!(stats.nodes_per_second(), 4.5);
    }

    #[test]
    fn test_total_node_counts_empty() {
        assert_eq!(total_node_counts(&[], 0), vec![1]);
        assert_eq!(total_node_counts(&[], 3), vec![1, 0, 0, 0]);
    }

    #[test]
    fn test_total_node_counts_keeps_max_depth_separate() {
        let stats = LocalityStatistics {
            node_counts: vec![0, 2, 4, 8],
            ..Default::default()
        };
        assert_eq!(total_node_counts(&[stats.clone()], 3), vec![1, 2, 4, 8]);
        assert_eq!(total_node_counts(&[stats], 2), vec![1, 2, 12]);
    }
}
