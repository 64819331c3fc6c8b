//! Per-locality registry: problem data and the local incumbent bound.
//!
//! Each locality keeps its own copy of the search space, the root node, and
//! a bound that may lag behind the global incumbent. Workers read the local
//! bound when pruning; improvements are pushed to every locality and applied
//! only if they are better than what the locality already holds, so the
//! bound moves monotonically no matter how updates interleave.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bnbforge_core::{BoundValue, Objective, SearchNode};

use crate::incumbent::IncumbentHandle;

/// Lock-free cell holding a bound that only ever improves.
pub struct BoundCell<B: BoundValue> {
    bits: AtomicU64,
    _marker: PhantomData<B>,
}

impl<B: BoundValue> BoundCell<B> {
    /// Creates a cell holding `initial`.
    pub fn new(initial: B) -> Self {
        Self {
            bits: AtomicU64::new(initial.encode()),
            _marker: PhantomData,
        }
    }

    /// Returns the current value.
    #[inline]
    pub fn load(&self) -> B {
        B::decode(self.bits.load(Ordering::Acquire))
    }

    /// Stores `candidate` if it is strictly better under `objective`.
    ///
    /// Returns true if the cell changed.
    pub fn update_if_better(&self, objective: Objective, candidate: B) -> bool {
        let mut current = self.bits.load(Ordering::Acquire);
        loop {
            if !objective.is_better(candidate, B::decode(current)) {
                return false;
            }
            match self.bits.compare_exchange_weak(
                current,
                candidate.encode(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

impl<B: BoundValue> fmt::Debug for BoundCell<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BoundCell").field(&self.load()).finish()
    }
}

/// Shared state of one locality for the duration of a search.
#[derive(Debug)]
pub struct Registry<Sp, N: SearchNode> {
    space: Sp,
    root: N,
    objective: Objective,
    local_bound: BoundCell<N::Bound>,
    incumbent: IncumbentHandle<N>,
    aborted: AtomicBool,
}

impl<Sp, N: SearchNode> Registry<Sp, N> {
    /// Creates a registry with the given initial local bound.
    pub fn new(
        space: Sp,
        root: N,
        objective: Objective,
        bound: N::Bound,
        incumbent: IncumbentHandle<N>,
    ) -> Self {
        Self {
            space,
            root,
            objective,
            local_bound: BoundCell::new(bound),
            incumbent,
            aborted: AtomicBool::new(false),
        }
    }

    /// Problem data.
    pub fn space(&self) -> &Sp {
        &self.space
    }

    /// Root node of the search tree.
    pub fn root(&self) -> &N {
        &self.root
    }

    /// Direction of optimization.
    pub fn objective(&self) -> Objective {
        self.objective
    }

    /// Best bound known on this locality.
    #[inline]
    pub fn local_bound(&self) -> N::Bound {
        self.local_bound.load()
    }

    /// Applies `bound` if it beats the local bound. Returns true if applied.
    pub fn update_bound(&self, bound: N::Bound) -> bool {
        self.local_bound.update_if_better(self.objective, bound)
    }

    /// Handle to the global incumbent.
    pub fn incumbent(&self) -> &IncumbentHandle<N> {
        &self.incumbent
    }

    /// Marks the search as failed; running tasks stop at their next
    /// checkpoint.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    /// Returns true once [`abort`](Self::abort) was called.
    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }
}
