//! Knapsack model: items sorted by density, decided one per tree level.

use bnbforge::{Children, Generator, Node};

#[derive(Debug, Clone, Copy)]
pub struct Item {
    pub weight: u32,
    pub value: u32,
}

#[derive(Debug, Clone)]
pub struct Instance {
    pub capacity: u32,
    pub items: Vec<Item>,
}

/// (chosen item indices, value so far, (next item, capacity left)).
pub type KnapsackNode = Node<Vec<usize>, u64, (usize, u32)>;

impl Instance {
    pub fn new(capacity: u32, items: Vec<(u32, u32)>) -> Self {
        let mut items: Vec<Item> = items
            .into_iter()
            .map(|(weight, value)| Item { weight, value })
            .collect();
        items.sort_by(|a, b| {
            (b.value as u64 * a.weight as u64).cmp(&(a.value as u64 * b.weight as u64))
        });
        Self { capacity, items }
    }

    pub fn root(&self) -> KnapsackNode {
        Node::new(Vec::new(), 0, (0, self.capacity))
    }

    /// Dantzig bound: greedy fill by density, splitting the first item that
    /// does not fit.
    pub fn relaxation(&self, node: &KnapsackNode) -> u64 {
        let (next, mut left) = node.candidate;
        let mut bound = node.bound;
        for item in &self.items[next..] {
            if item.weight <= left {
                left -= item.weight;
                bound += item.value as u64;
            } else {
                bound += item.value as u64 * left as u64 / item.weight as u64;
                break;
            }
        }
        bound
    }
}

/// Yields "take" (when the item fits) and then "skip", built on demand.
pub struct Decisions {
    parent: KnapsackNode,
    item: Option<Item>,
    take_next: bool,
    done: bool,
}

impl Iterator for Decisions {
    type Item = KnapsackNode;

    fn next(&mut self) -> Option<KnapsackNode> {
        if self.done {
            return None;
        }
        let item = self.item?;
        let (index, left) = self.parent.candidate;

        if self.take_next {
            self.take_next = false;
            let mut chosen = self.parent.solution.clone();
            chosen.push(index);
            return Some(Node::new(
                chosen,
                self.parent.bound + item.value as u64,
                (index + 1, left - item.weight),
            ));
        }

        self.done = true;
        Some(Node::new(
            self.parent.solution.clone(),
            self.parent.bound,
            (index + 1, left),
        ))
    }
}

pub struct Packer;

impl Generator for Packer {
    type Space = Instance;
    type Node = KnapsackNode;
    type Iter = Decisions;

    fn generate(
        &self,
        space: &Instance,
        node: &KnapsackNode,
    ) -> bnbforge::Result<Children<Decisions>> {
        let (index, left) = node.candidate;
        let item = space.items.get(index).copied();
        let fits = item.is_some_and(|item| item.weight <= left);
        let count = match item {
            None => 0,
            Some(_) if fits => 2,
            Some(_) => 1,
        };
        Ok(Children::new(
            count,
            Decisions {
                parent: node.clone(),
                item,
                take_next: fits,
                done: false,
            },
        ))
    }
}
