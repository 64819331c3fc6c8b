//! Complete binary tree fixtures.
//!
//! A tree of depth `d` has `2^d` leaves carrying the values of
//! [`TreeSpace::leaves`], left to right. A node's solution is its path of
//! 0/1 choices; inner nodes carry the worst possible value so only leaves
//! ever become incumbents.
//!
//! # Example
//!
//! ```
//! use bnbforge_test::tree::TreeSpace;
//!
//! let space = TreeSpace::new(2, vec![3, 9, 4, 1]);
//! assert_eq!(space.best_leaf(), 9);
//! assert_eq!(space.node_count(), 7);
//! assert_eq!(space.subtree_best(&[1]), 4);
//! ```

use std::ops::Range;

use bnbforge_core::{BnbError, Children, Generator, Node, Objective, Result};

/// A node of the binary tree: (path, value, ()).
pub type TreeNode = Node<Vec<usize>, i64, ()>;

/// Problem data of a binary tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeSpace {
    pub depth: usize,
    pub leaves: Vec<i64>,
    pub objective: Objective,
}

impl TreeSpace {
    /// Creates a tree to be maximized.
    ///
    /// # Panics
    ///
    /// Panics if `leaves` does not hold exactly `2^depth` values.
    pub fn new(depth: usize, leaves: Vec<i64>) -> Self {
        assert_eq!(
            leaves.len(),
            1 << depth,
            "a tree of depth {depth} needs {} leaves",
            1 << depth
        );
        Self {
            depth,
            leaves,
            objective: Objective::Maximize,
        }
    }

    /// Switches the tree to minimization.
    pub fn minimizing(mut self) -> Self {
        self.objective = Objective::Minimize;
        self
    }

    /// Value of inner nodes: the worst value under the objective.
    pub fn placeholder(&self) -> i64 {
        match self.objective {
            Objective::Maximize => i64::MIN,
            Objective::Minimize => i64::MAX,
        }
    }

    /// Best value that can never be pruned against.
    pub fn unbounded(&self) -> i64 {
        match self.objective {
            Objective::Maximize => i64::MAX,
            Objective::Minimize => i64::MIN,
        }
    }

    /// Total number of nodes, root included.
    pub fn node_count(&self) -> u64 {
        (1u64 << (self.depth + 1)) - 1
    }

    /// Leaves below the node at `path`.
    pub fn leaf_range(&self, path: &[usize]) -> Range<usize> {
        let prefix = path.iter().fold(0usize, |acc, &bit| acc * 2 + bit);
        let width = 1usize << (self.depth - path.len());
        prefix * width..(prefix + 1) * width
    }

    /// Best leaf value below the node at `path`.
    pub fn subtree_best(&self, path: &[usize]) -> i64 {
        let leaves = self.leaves[self.leaf_range(path)].iter().copied();
        match self.objective {
            Objective::Maximize => leaves.max().unwrap_or(i64::MIN),
            Objective::Minimize => leaves.min().unwrap_or(i64::MAX),
        }
    }

    /// Best leaf of the whole tree.
    pub fn best_leaf(&self) -> i64 {
        self.subtree_best(&[])
    }

    /// Root node.
    pub fn root(&self) -> TreeNode {
        self.node_at(Vec::new())
    }

    /// Node at `path`.
    pub fn node_at(&self, path: Vec<usize>) -> TreeNode {
        let value = if path.len() == self.depth {
            self.leaves[self.leaf_range(&path).start]
        } else {
            self.placeholder()
        };
        Node::new(path, value, ())
    }

    /// Admissible bound that is exact: the best leaf below the node.
    pub fn exact_bound(space: &TreeSpace, node: &TreeNode) -> i64 {
        space.subtree_best(&node.solution)
    }

    /// Bound that never prunes anything.
    pub fn optimistic_bound(space: &TreeSpace, _node: &TreeNode) -> i64 {
        space.unbounded()
    }

    fn children(&self, node: &TreeNode) -> Children<std::vec::IntoIter<TreeNode>> {
        if node.solution.len() >= self.depth {
            return Children::from_vec(Vec::new());
        }
        let children = (0..2)
            .map(|bit| {
                let mut path = node.solution.clone();
                path.push(bit);
                self.node_at(path)
            })
            .collect();
        Children::from_vec(children)
    }
}

/// Generator of a complete binary tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryTree;

impl Generator for BinaryTree {
    type Space = TreeSpace;
    type Node = TreeNode;
    type Iter = std::vec::IntoIter<TreeNode>;

    fn generate(&self, space: &TreeSpace, node: &TreeNode) -> Result<Children<Self::Iter>> {
        Ok(space.children(node))
    }
}

/// Binary tree generator that fails when asked for the children of one node.
#[derive(Debug, Clone, Default)]
pub struct FailingTree {
    pub fail_at: Vec<usize>,
}

impl FailingTree {
    /// Fails when generating the children of the node at `path`.
    pub fn new(path: Vec<usize>) -> Self {
        Self { fail_at: path }
    }
}

impl Generator for FailingTree {
    type Space = TreeSpace;
    type Node = TreeNode;
    type Iter = std::vec::IntoIter<TreeNode>;

    fn generate(&self, space: &TreeSpace, node: &TreeNode) -> Result<Children<Self::Iter>> {
        if node.solution == self.fail_at {
            return Err(BnbError::plugin(format!(
                "cannot expand node {:?}",
                node.solution
            )));
        }
        Ok(space.children(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_shape() {
        let space = TreeSpace::new(3, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        let root = space.root();
        assert_eq!(root.bound, i64::MIN);

        let children: Vec<_> = BinaryTree.generate(&space, &root).unwrap().collect();
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].solution, vec![1]);

        let leaf = space.node_at(vec![1, 0, 1]);
        assert_eq!(leaf.bound, 6);
        assert_eq!(BinaryTree.generate(&space, &leaf).unwrap().num_children(), 0);
        assert_eq!(space.node_count(), 15);
    }

    #[test]
    fn test_minimizing_tree() {
        let space = TreeSpace::new(2, vec![4, 2, 7, 3]).minimizing();
        assert_eq!(space.best_leaf(), 2);
        assert_eq!(space.root().bound, i64::MAX);
        assert_eq!(TreeSpace::exact_bound(&space, &space.node_at(vec![1])), 3);
    }

    #[test]
    fn test_failing_tree() {
        let space = TreeSpace::new(2, vec![0; 4]);
        let generator = FailingTree::new(vec![0]);
        assert!(generator.generate(&space, &space.root()).is_ok());
        let err = generator.generate(&space, &space.node_at(vec![0])).unwrap_err();
        assert!(matches!(err, BnbError::Plugin(_)));
    }
}
