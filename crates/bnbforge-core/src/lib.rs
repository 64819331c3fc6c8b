//! BnBForge Core - Core types and traits for branch-and-bound search
//!
//! This crate provides the fundamental abstractions shared by the search
//! engine and problem plug-ins:
//! - Node types and the objective they carry
//! - Bound values and the maximize/minimize comparator
//! - Paths, the compact replayable task location
//! - The generator and bound-function plug-in traits
//! - The error taxonomy

pub mod bound;
pub mod error;
pub mod node;
pub mod path;
pub mod plugin;

pub use bound::{BoundValue, Objective};
pub use error::{BnbError, Result};
pub use node::{Node, SearchNode};
pub use path::Path;
pub use plugin::{BoundFunction, Children, Generator};
