//! Search tree nodes.

use std::fmt::Debug;

use crate::bound::BoundValue;

/// A node in the implicit search tree.
///
/// Nodes are produced only by a [`Generator`](crate::plugin::Generator) and
/// are immutable once produced. They are never shipped between localities;
/// a remote worker rebuilds them by replaying a [`Path`](crate::path::Path).
pub trait SearchNode: Clone + Debug + Send + Sync + 'static {
    /// The ordered quality value of this node.
    type Bound: BoundValue;

    /// The objective value of the partial solution held by this node.
    fn objective(&self) -> Self::Bound;
}

/// The standard (solution, bound, candidate) node triple.
///
/// `solution` and `candidate` are problem-specific payloads; `bound` is the
/// objective value of `solution`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node<S, B, C> {
    /// Partial solution built so far.
    pub solution: S,
    /// Objective value of `solution`.
    pub bound: B,
    /// Remaining candidates for extension.
    pub candidate: C,
}

impl<S, B, C> Node<S, B, C> {
    /// Creates a new node.
    pub fn new(solution: S, bound: B, candidate: C) -> Self {
        Self {
            solution,
            bound,
            candidate,
        }
    }
}

impl<S, B, C> SearchNode for Node<S, B, C>
where
    S: Clone + Debug + Send + Sync + 'static,
    B: BoundValue,
    C: Clone + Debug + Send + Sync + 'static,
{
    type Bound = B;

    #[inline]
    fn objective(&self) -> B {
        self.bound
    }
}
