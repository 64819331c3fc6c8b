//! Bound function wrapper that records every node it is asked about.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bnbforge_core::{BoundFunction, Result};

use crate::tree::{TreeNode, TreeSpace};

/// Wraps a tree bound function and logs the path of every bounded node.
///
/// Clones share the same log, so a test keeps one clone and hands the other
/// to the search.
#[derive(Debug, Clone)]
pub struct CountingBound<F> {
    inner: F,
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<Vec<usize>>>>,
}

impl<F> CountingBound<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of bound evaluations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Paths of every bounded node, sorted.
    pub fn seen(&self) -> Vec<Vec<usize>> {
        let mut seen = self.seen.lock().unwrap().clone();
        seen.sort();
        seen
    }
}

impl<F> BoundFunction<TreeSpace, TreeNode> for CountingBound<F>
where
    F: BoundFunction<TreeSpace, TreeNode>,
{
    fn bound(&self, space: &TreeSpace, node: &TreeNode) -> Result<i64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(node.solution.clone());
        self.inner.bound(space, node)
    }
}
