//! Problem plug-in interface.
//!
//! A problem supplies two pieces: a [`Generator`] that lazily lists the
//! children of a node, and a [`BoundFunction`] that estimates the best value
//! reachable below a node. Both must be deterministic: path replay assumes
//! that generating children for the same node twice yields the same
//! sequence in the same order.

use crate::error::Result;
use crate::node::SearchNode;

/// A lazily produced, finite list of children with a declared length.
///
/// The declared count is known up front so the search can index positions
/// before any child is materialized. `next` advances by one and `nth` skips
/// ahead, both through the [`Iterator`] implementation.
#[derive(Debug, Clone)]
pub struct Children<I> {
    count: usize,
    iter: I,
}

impl<I: Iterator> Children<I> {
    /// Wraps an iterator that will yield exactly `count` children.
    pub fn new(count: usize, iter: I) -> Self {
        Self { count, iter }
    }

    /// Returns the declared branching factor.
    pub fn num_children(&self) -> usize {
        self.count
    }
}

impl<T> Children<std::vec::IntoIter<T>> {
    /// Builds a child list from an already materialized vector.
    pub fn from_vec(children: Vec<T>) -> Self {
        Self {
            count: children.len(),
            iter: children.into_iter(),
        }
    }
}

impl<I: Iterator> Iterator for Children<I> {
    type Item = I::Item;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }

    #[inline]
    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        self.iter.nth(n)
    }
}

/// Produces the children of a node.
///
/// Implementations must be pure with respect to `(space, node)`.
pub trait Generator: Send + Sync + 'static {
    /// Immutable problem data shared by every locality.
    type Space: Clone + Send + Sync + 'static;

    /// Node type of the search tree.
    type Node: SearchNode;

    /// Iterator over children.
    type Iter: Iterator<Item = Self::Node>;

    /// Returns the children of `node`.
    fn generate(&self, space: &Self::Space, node: &Self::Node) -> Result<Children<Self::Iter>>;
}

/// Computes an admissible bound on the best objective reachable below a node.
///
/// Must be safe to call concurrently on different nodes.
pub trait BoundFunction<Sp, N: SearchNode>: Send + Sync + 'static {
    /// Returns the bound for `node`.
    fn bound(&self, space: &Sp, node: &N) -> Result<N::Bound>;
}

impl<Sp, N, F> BoundFunction<Sp, N> for F
where
    N: SearchNode,
    F: Fn(&Sp, &N) -> N::Bound + Send + Sync + 'static,
{
    #[inline]
    fn bound(&self, space: &Sp, node: &N) -> Result<N::Bound> {
        Ok(self(space, node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_from_vec() {
        let mut children = Children::from_vec(vec!['a', 'b', 'c', 'd']);
        assert_eq!(children.num_children(), 4);
        assert_eq!(children.next(), Some('a'));
        assert_eq!(children.nth(1), Some('c'));
        assert_eq!(children.next(), Some('d'));
        assert_eq!(children.next(), None);
    }

    #[test]
    fn test_lazy_children() {
        let children = Children::new(3, (0..3).map(|i| i * 10));
        assert_eq!(children.num_children(), 3);
        assert_eq!(children.collect::<Vec<_>>(), vec![0, 10, 20]);
    }
}
