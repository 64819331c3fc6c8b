//! Paths: the compact, replayable location of a node in the search tree.
//!
//! A path is the sequence of child indices taken from the root. The first
//! entry is a sentinel standing for the root itself, so the root's path is
//! `[0]` and its third child's path is `[0, 2]`. Paths are the only way a
//! task names where it starts; nodes are rebuilt by replaying the generator.

use std::fmt;

use smallvec::SmallVec;

/// Sentinel stored at the head of every path.
pub const ROOT_SENTINEL: usize = 0;

/// Sequence of child-selection indices, starting with the root sentinel.
#[derive(Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Path {
    indices: SmallVec<[usize; 16]>,
}

impl Path {
    /// The path of the root node.
    pub fn root() -> Self {
        let mut indices = SmallVec::new();
        indices.push(ROOT_SENTINEL);
        Self { indices }
    }

    /// Builds a path from child indices below the root (sentinel excluded).
    pub fn from_steps(steps: impl IntoIterator<Item = usize>) -> Self {
        let mut path = Self::root();
        path.indices.extend(steps);
        path
    }

    /// Returns a new path extended by one child index.
    pub fn child(&self, index: usize) -> Self {
        let mut path = self.clone();
        path.indices.push(index);
        path
    }

    /// Appends a child index in place.
    pub fn push(&mut self, index: usize) {
        self.indices.push(index);
    }

    /// Child indices below the root, with the sentinel stripped.
    pub fn steps(&self) -> &[usize] {
        self.indices.get(1..).unwrap_or(&[])
    }

    /// Raw indices including the sentinel.
    pub fn as_slice(&self) -> &[usize] {
        &self.indices
    }

    /// Number of edges between the root and the node this path names.
    pub fn depth(&self) -> usize {
        self.steps().len()
    }

    /// Returns true if this path names the root.
    pub fn is_root(&self) -> bool {
        self.steps().is_empty()
    }
}

impl Default for Path {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, idx) in self.indices.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", idx)?;
        }
        write!(f, "]")
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path{}", self)
    }
}
