//! Position index: the per-task cursor over the lazily generated tree.
//!
//! A task walks its subtree depth first. For every level on the current
//! root-to-node path the index keeps one [`Frame`]: how many children the
//! level declares (known only once the generator ran), the next unvisited
//! position, and the exclusive end of the positions still owned by this
//! task. Steals move a level's end down and hand the tail to another task;
//! level pruning moves it down to the cursor. Both only ever shrink the
//! unvisited range, so the donor and the thief never share a position.
//!
//! The index is touched only by its owning task: steals are served at the
//! task's own checkpoints, never concurrently.

use std::ops::Range;

use bnbforge_config::StealChunk;
use bnbforge_core::{Path, Result};
use tracing::debug;

use crate::completion::{completion, CompletionFuture};
use crate::work_queue::TaskDescriptor;

#[derive(Debug)]
struct Frame {
    /// Position in the parent level that led to this level's node.
    index_in_parent: usize,
    /// Declared child count, unknown until the generator reports it.
    num_children: Option<usize>,
    next: usize,
    end: usize,
    /// Completion futures of work stolen from this subtree.
    futures: Vec<CompletionFuture>,
}

impl Frame {
    fn new(index_in_parent: usize, window: Range<usize>) -> Self {
        Self {
            index_in_parent,
            num_children: None,
            next: window.start,
            end: window.end,
            futures: Vec::new(),
        }
    }

    fn remaining(&self) -> usize {
        match self.num_children {
            Some(_) => self.end.saturating_sub(self.next),
            None => 0,
        }
    }
}

/// Stack-shaped cursor over the subtree owned by one task.
#[derive(Debug)]
pub struct PositionIndex {
    base: Path,
    frames: Vec<Frame>,
    steal_chunk: StealChunk,
}

impl PositionIndex {
    /// Creates an index for a task exploring `window` of the children of
    /// the node at `base`.
    pub fn new(base: Path, window: Range<usize>, steal_chunk: StealChunk) -> Self {
        let index_in_parent = base.steps().last().copied().unwrap_or(0);
        Self {
            base,
            frames: vec![Frame::new(index_in_parent, window)],
            steal_chunk,
        }
    }

    /// Creates an index for a task descriptor.
    pub fn for_task(task: &TaskDescriptor, steal_chunk: StealChunk) -> Self {
        Self::new(task.path.clone(), task.window.clone(), steal_chunk)
    }

    fn top(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    /// Records the branching factor of the current level.
    ///
    /// Must be called once per level, right after the generator reports it
    /// and before enumeration. Positions past `n` are dropped from the
    /// owned window.
    pub fn set_num_children(&mut self, n: usize) {
        let frame = self.top();
        frame.num_children = Some(n);
        frame.end = frame.end.min(n);
        frame.next = frame.next.min(frame.end);
    }

    /// Returns the next unvisited position at the current level and
    /// advances past it, or `None` once the level is exhausted.
    pub fn next_position(&mut self) -> Option<usize> {
        let frame = self.top();
        if frame.remaining() == 0 {
            return None;
        }
        let position = frame.next;
        frame.next += 1;
        Some(position)
    }

    /// Descends into child `index` of the current level.
    pub fn pre_expand(&mut self, index: usize) {
        self.frames.push(Frame::new(index, 0..usize::MAX));
    }

    /// Returns from the current level to its parent.
    ///
    /// Futures of work stolen from the finished level are kept with the
    /// parent so [`PositionIndex::wait_futures`] still joins them.
    pub fn post_expand(&mut self) {
        if self.frames.len() <= 1 {
            return;
        }
        if let Some(frame) = self.frames.pop() {
            self.top().futures.extend(frame.futures);
        }
    }

    /// Discards every unvisited position of the current level.
    ///
    /// The level's end is set to its visited count, so the declared child
    /// count and the positions handed out stay consistent.
    pub fn prune_level(&mut self) {
        let frame = self.top();
        frame.end = frame.next;
    }

    /// Number of levels on the current path (1 at the task's start node).
    pub fn levels(&self) -> usize {
        self.frames.len()
    }

    /// Tree depth of the node whose children the current level lists.
    pub fn node_depth(&self) -> usize {
        self.base.depth() + self.frames.len() - 1
    }

    /// Unvisited positions still owned at `level`, if the level exists.
    pub fn unvisited(&self, level: usize) -> Option<Range<usize>> {
        self.frames.get(level).map(|frame| match frame.num_children {
            Some(_) => frame.next..frame.end.max(frame.next),
            None => frame.next..frame.next,
        })
    }

    /// Location of the node whose children are listed at `level`.
    pub fn path_to(&self, level: usize) -> Path {
        let mut path = self.base.clone();
        for frame in self.frames.iter().take(level + 1).skip(1) {
            path.push(frame.index_in_parent);
        }
        path
    }

    /// Level a steal would take from: the current level if it still has
    /// work, otherwise the shallowest level that does.
    fn steal_level(&self) -> Option<usize> {
        let current = self.frames.len() - 1;
        if self.frames[current].remaining() > 0 {
            return Some(current);
        }
        self.frames.iter().position(|frame| frame.remaining() > 0)
    }

    /// Serves a steal request.
    ///
    /// Gives away a contiguous tail of unvisited positions of one level,
    /// together with the path of the node owning that level. The positions
    /// are removed from this index before the response leaves, and the
    /// thief's completion future is kept so [`PositionIndex::wait_futures`]
    /// joins it. Returns `None` if no level has unvisited positions.
    pub fn steal(&mut self) -> Option<TaskDescriptor> {
        let level = self.steal_level()?;
        let path = self.path_to(level);
        let chunk = self.steal_chunk;
        let frame = &mut self.frames[level];

        let take = chunk.take(frame.remaining());
        let start = frame.end - take;
        let window = start..frame.end;
        frame.end = start;

        let (handle, future) = completion();
        frame.futures.push(future);

        debug!(
            event = "steal_granted",
            path = %path,
            start = window.start,
            end = window.end,
        );
        Some(TaskDescriptor::new(path, window, handle))
    }

    /// Number of stolen descendants not yet joined.
    pub fn pending_futures(&self) -> usize {
        self.frames.iter().map(|frame| frame.futures.len()).sum()
    }

    /// Blocks until every task stolen from this index has completed.
    ///
    /// All futures are joined even if one reports an error; the first
    /// error is returned.
    pub fn wait_futures(&mut self) -> Result<()> {
        let mut outcome = Ok(());
        for frame in self.frames.iter_mut() {
            for future in frame.futures.drain(..) {
                let result = future.wait();
                if outcome.is_ok() {
                    outcome = result;
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests;
