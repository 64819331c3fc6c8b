//! Shared test fixtures for BnBForge crates.
//!
//! This crate provides small problems with known optima for testing the
//! search engine:
//!
//! - [`tree`] - Complete binary tree with values on its leaves
//! - [`knapsack`] - 0/1 knapsack with a fractional relaxation bound
//! - [`counting`] - Bound function wrapper recording every call
//!
//! # Usage
//!
//! Add as a dev-dependency in your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! bnbforge-test = { workspace = true }
//! ```

pub mod counting;
pub mod knapsack;
pub mod tree;

pub use counting::CountingBound;
pub use knapsack::{Item, Knapsack, KnapsackGenerator, KnapsackNode, KnapsackState};
pub use tree::{BinaryTree, FailingTree, TreeNode, TreeSpace};
