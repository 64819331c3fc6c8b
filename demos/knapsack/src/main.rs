//! Solves a random 0/1 knapsack instance on several simulated localities.
//!
//! Reads `search.toml` from the working directory when present.

use std::thread;

use bnbforge::prelude::*;
use bnbforge::{console, improvement_channel};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

mod problem;

use problem::{Instance, KnapsackNode, Packer};

const ITEMS: usize = 48;
const SEED: u64 = 7;

fn main() -> bnbforge::Result<()> {
    console::init();

    let config = SearchConfig::load("search.toml").unwrap_or_default();
    let instance = random_instance(ITEMS, SEED);
    info!(
        event = "instance",
        items = instance.items.len(),
        capacity = instance.capacity,
    );

    let (tx, mut rx) = improvement_channel::<KnapsackNode>();
    let listener = thread::spawn(move || {
        let mut improvements = 0u64;
        while let Some((_, value)) = rx.blocking_recv() {
            improvements += 1;
            println!("  improvement #{improvements}: value {value}");
        }
        improvements
    });

    let root = instance.root();
    let outcome = BranchAndBound::new(Packer, Instance::relaxation)
        .with_config(config.with_objective(Objective::Maximize))
        .with_improvement_sender(tx)
        .search(instance.clone(), root)?;

    let improvements = listener.join().unwrap_or(0);
    let weight: u32 = outcome
        .best
        .solution
        .iter()
        .map(|&i| instance.items[i].weight)
        .sum();

    println!();
    println!(
        "Best value {} using {} of {} items (weight {}/{})",
        outcome.bound(),
        outcome.best.solution.len(),
        instance.items.len(),
        weight,
        instance.capacity,
    );
    println!(
        "{} nodes, {} pruned, {} improvements, {} steals granted across {} localities",
        outcome.statistics.total_nodes(),
        outcome.statistics.total_pruned(),
        improvements,
        outcome.statistics.steals_granted(),
        outcome.statistics.localities.len(),
    );
    Ok(())
}

fn random_instance(n: usize, seed: u64) -> Instance {
    let mut rng = StdRng::seed_from_u64(seed);
    let items = (0..n)
        .map(|_| (rng.random_range(5..=60), rng.random_range(10..=120)))
        .collect::<Vec<_>>();
    let capacity = items.iter().map(|&(w, _)| w).sum::<u32>() * 2 / 5;
    Instance::new(capacity, items)
}
