//! 0/1 knapsack fixtures.
//!
//! Items are kept sorted by value density, and a node decides the items
//! one by one: "take" first (when it fits), then "skip". With the
//! fractional relaxation as bound, children come out in non-increasing
//! bound order, so level pruning is sound on this problem.
//!
//! # Example
//!
//! ```
//! use bnbforge_test::knapsack::{Item, Knapsack};
//!
//! let problem = Knapsack::new(10, vec![Item::new(5, 10), Item::new(4, 40), Item::new(6, 30)]);
//! assert_eq!(problem.optimum(), 70);
//! ```

use bnbforge_core::{Children, Generator, Node, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A knapsack item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item {
    pub weight: u32,
    pub value: u32,
}

impl Item {
    pub fn new(weight: u32, value: u32) -> Self {
        Self { weight, value }
    }
}

/// Decision state of a knapsack node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnapsackState {
    /// Index of the next item to decide.
    pub next_item: usize,
    /// Capacity left.
    pub remaining: u32,
}

/// A knapsack node: (taken item indices, total value, state).
pub type KnapsackNode = Node<Vec<usize>, u64, KnapsackState>;

/// A knapsack instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Knapsack {
    pub capacity: u32,
    pub items: Vec<Item>,
}

impl Knapsack {
    /// Creates an instance; items are reordered by decreasing value density.
    pub fn new(capacity: u32, mut items: Vec<Item>) -> Self {
        items.sort_by(|a, b| {
            let lhs = b.value as u64 * a.weight as u64;
            let rhs = a.value as u64 * b.weight as u64;
            lhs.cmp(&rhs)
        });
        Self { capacity, items }
    }

    /// Creates a random instance with `n` items and half the total weight as
    /// capacity.
    pub fn random(n: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let items: Vec<Item> = (0..n)
            .map(|_| Item::new(rng.random_range(1..=30), rng.random_range(1..=50)))
            .collect();
        let capacity = items.iter().map(|item| item.weight).sum::<u32>() / 2;
        Self::new(capacity, items)
    }

    /// Root node: nothing decided, nothing taken.
    pub fn root(&self) -> KnapsackNode {
        Node::new(
            Vec::new(),
            0,
            KnapsackState {
                next_item: 0,
                remaining: self.capacity,
            },
        )
    }

    /// Optimal value, by dynamic programming over capacities.
    pub fn optimum(&self) -> u64 {
        let capacity = self.capacity as usize;
        let mut best = vec![0u64; capacity + 1];
        for item in &self.items {
            let weight = item.weight as usize;
            for c in (weight..=capacity).rev() {
                best[c] = best[c].max(best[c - weight] + item.value as u64);
            }
        }
        best[capacity]
    }

    /// Fractional relaxation: value taken so far plus the greedy fill of the
    /// remaining capacity, splitting the first item that does not fit.
    pub fn fractional_bound(space: &Knapsack, node: &KnapsackNode) -> u64 {
        let mut bound = node.bound;
        let mut remaining = node.candidate.remaining as u64;
        for item in &space.items[node.candidate.next_item..] {
            let weight = item.weight as u64;
            if weight <= remaining {
                remaining -= weight;
                bound += item.value as u64;
            } else {
                bound += item.value as u64 * remaining / weight;
                break;
            }
        }
        bound
    }
}

/// Generator deciding one item per level.
#[derive(Debug, Clone, Copy, Default)]
pub struct KnapsackGenerator;

impl Generator for KnapsackGenerator {
    type Space = Knapsack;
    type Node = KnapsackNode;
    type Iter = std::vec::IntoIter<KnapsackNode>;

    fn generate(&self, space: &Knapsack, node: &KnapsackNode) -> Result<Children<Self::Iter>> {
        let index = node.candidate.next_item;
        let Some(item) = space.items.get(index) else {
            return Ok(Children::from_vec(Vec::new()));
        };

        let mut children = Vec::with_capacity(2);
        if item.weight <= node.candidate.remaining {
            let mut taken = node.solution.clone();
            taken.push(index);
            children.push(Node::new(
                taken,
                node.bound + item.value as u64,
                KnapsackState {
                    next_item: index + 1,
                    remaining: node.candidate.remaining - item.weight,
                },
            ));
        }
        children.push(Node::new(
            node.solution.clone(),
            node.bound,
            KnapsackState {
                next_item: index + 1,
                remaining: node.candidate.remaining,
            },
        ));
        Ok(Children::from_vec(children))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_sorted_by_density() {
        let problem = Knapsack::new(10, vec![Item::new(5, 10), Item::new(4, 40), Item::new(6, 30)]);
        assert_eq!(problem.items[0], Item::new(4, 40));
        assert_eq!(problem.items[2], Item::new(5, 10));
    }

    #[test]
    fn test_children_take_then_skip() {
        let problem = Knapsack::new(5, vec![Item::new(4, 40), Item::new(6, 30)]);
        let root = problem.root();
        let children: Vec<_> = KnapsackGenerator.generate(&problem, &root).unwrap().collect();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].solution, vec![0]);
        assert_eq!(children[0].bound, 40);
        assert_eq!(children[1].bound, 0);

        // Second item no longer fits: only "skip" remains.
        let children: Vec<_> = KnapsackGenerator
            .generate(&problem, &children[0])
            .unwrap()
            .collect();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].candidate.next_item, 2);
    }

    #[test]
    fn test_fractional_bound_is_admissible() {
        let problem = Knapsack::random(12, 3);
        let bound = Knapsack::fractional_bound(&problem, &problem.root());
        assert!(bound >= problem.optimum());
    }

    #[test]
    fn test_take_child_bounds_at_least_skip_child() {
        let problem = Knapsack::random(10, 11);
        let root = problem.root();
        let children: Vec<_> = KnapsackGenerator.generate(&problem, &root).unwrap().collect();
        let bounds: Vec<u64> = children
            .iter()
            .map(|child| Knapsack::fractional_bound(&problem, child))
            .collect();
        assert!(bounds.windows(2).all(|w| w[0] >= w[1]));
    }
}
