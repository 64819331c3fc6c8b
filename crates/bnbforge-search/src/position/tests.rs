//! Tests for the position index.

use super::*;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::thread;

fn root_index(chunk: StealChunk) -> PositionIndex {
    PositionIndex::new(Path::root(), 0..usize::MAX, chunk)
}

fn drain(index: &mut PositionIndex) -> Vec<usize> {
    std::iter::from_fn(|| index.next_position()).collect()
}

#[test]
fn test_enumerates_declared_children() {
    let mut index = root_index(StealChunk::Single);
    assert_eq!(index.next_position(), None);
    index.set_num_children(3);
    assert_eq!(drain(&mut index), vec![0, 1, 2]);
    assert_eq!(index.next_position(), None);
}

#[test]
fn test_window_limits_positions() {
    let mut index = PositionIndex::new(Path::from_steps([1]), 2..4, StealChunk::Single);
    index.set_num_children(6);
    assert_eq!(drain(&mut index), vec![2, 3]);
}

#[test]
fn test_window_clamped_to_child_count() {
    let mut index = PositionIndex::new(Path::root(), 1..10, StealChunk::Single);
    index.set_num_children(3);
    assert_eq!(drain(&mut index), vec![1, 2]);
}

#[test]
fn test_single_steal_takes_tail() {
    let mut index = root_index(StealChunk::Single);
    index.set_num_children(5);
    assert_eq!(index.next_position(), Some(0));

    let stolen = index.steal().expect("work left");
    assert!(stolen.path.is_root());
    assert_eq!(stolen.window, 4..5);
    assert_eq!(stolen.depth, 1);
    assert_eq!(drain(&mut index), vec![1, 2, 3]);
}

#[test]
fn test_half_and_all_steals() {
    let mut index = root_index(StealChunk::Half);
    index.set_num_children(7);
    index.next_position();
    assert_eq!(index.steal().unwrap().window, 4..7);
    assert_eq!(index.unvisited(0), Some(1..4));

    let mut index = root_index(StealChunk::All);
    index.set_num_children(4);
    index.next_position();
    assert_eq!(index.steal().unwrap().window, 1..4);
    assert_eq!(index.next_position(), None);
}

#[test]
fn test_steal_never_loses_or_duplicates_positions() {
    for chunk in [StealChunk::Single, StealChunk::Half, StealChunk::All] {
        for count in 1..9 {
            for visited in 0..count {
                let mut index = root_index(chunk);
                index.set_num_children(count);
                for _ in 0..visited {
                    index.next_position();
                }
                let original: BTreeSet<usize> = (visited..count).collect();

                let granted: BTreeSet<usize> = index.steal().unwrap().window.collect();
                let retained: BTreeSet<usize> = drain(&mut index).into_iter().collect();

                assert!(granted.is_disjoint(&retained));
                let union: BTreeSet<usize> = granted.union(&retained).copied().collect();
                assert_eq!(union, original, "chunk {:?} count {} visited {}", chunk, count, visited);
            }
        }
    }
}

#[test]
fn test_steal_prefers_current_level() {
    let mut index = root_index(StealChunk::Single);
    index.set_num_children(4);
    assert_eq!(index.next_position(), Some(0));
    index.pre_expand(0);
    index.set_num_children(3);
    assert_eq!(index.next_position(), Some(0));

    let stolen = index.steal().unwrap();
    assert_eq!(stolen.path, Path::from_steps([0]));
    assert_eq!(stolen.window, 2..3);
    assert_eq!(stolen.depth, 2);
    assert_eq!(index.unvisited(0), Some(1..4));
}

#[test]
fn test_steal_bubbles_to_shallowest_level() {
    let mut index = root_index(StealChunk::Single);
    index.set_num_children(3);
    index.next_position();
    index.pre_expand(0);
    index.set_num_children(2);
    index.next_position();
    index.pre_expand(0);
    // The deepest level has not reported its children yet.
    let stolen = index.steal().unwrap();
    assert!(stolen.path.is_root());
    assert_eq!(stolen.window, 2..3);

    let stolen = index.steal().unwrap();
    assert!(stolen.path.is_root());
    assert_eq!(stolen.window, 1..2);

    let stolen = index.steal().unwrap();
    assert_eq!(stolen.path, Path::from_steps([0]));
    assert_eq!(stolen.window, 1..2);

    assert!(index.steal().is_none());
    assert_eq!(index.pending_futures(), 3);
}

#[test]
fn test_steal_path_from_non_root_task() {
    let mut index = PositionIndex::new(Path::from_steps([2, 1]), 0..usize::MAX, StealChunk::Single);
    assert_eq!(index.node_depth(), 2);
    index.set_num_children(2);
    assert_eq!(index.next_position(), Some(0));
    index.pre_expand(0);
    assert_eq!(index.node_depth(), 3);
    index.set_num_children(2);
    index.next_position();

    let stolen = index.steal().unwrap();
    assert_eq!(stolen.path, Path::from_steps([2, 1, 0]));
    assert_eq!(stolen.depth, 4);
}

#[test]
fn test_steal_with_no_work_is_none() {
    let mut index = root_index(StealChunk::Half);
    assert!(index.steal().is_none());

    index.set_num_children(2);
    drain(&mut index);
    assert!(index.steal().is_none());

    index.pre_expand(1);
    index.set_num_children(0);
    assert!(index.steal().is_none());
    assert_eq!(index.pending_futures(), 0);
}

#[test]
fn test_prune_level_exhausts_level() {
    let mut index = root_index(StealChunk::Single);
    index.set_num_children(6);
    index.next_position();
    index.next_position();
    index.prune_level();
    assert_eq!(index.next_position(), None);
    assert_eq!(index.unvisited(0), Some(2..2));
    assert!(index.steal().is_none());
}

#[test]
fn test_post_expand_keeps_futures() {
    let mut index = root_index(StealChunk::Single);
    index.set_num_children(1);
    index.next_position();
    index.pre_expand(0);
    index.set_num_children(2);
    index.next_position();
    let stolen = index.steal().unwrap();
    index.post_expand();
    assert_eq!(index.levels(), 1);
    assert_eq!(index.pending_futures(), 1);

    stolen.completion.complete(Ok(()));
    assert_eq!(index.wait_futures(), Ok(()));
    assert_eq!(index.pending_futures(), 0);
}

#[test]
fn test_wait_futures_reports_first_error() {
    let mut index = root_index(StealChunk::Single);
    index.set_num_children(3);
    let first = index.steal().unwrap();
    let second = index.steal().unwrap();
    first.completion.complete(Err(bnbforge_core::BnbError::plugin("bad bound")));
    second.completion.complete(Ok(()));
    assert_eq!(
        index.wait_futures(),
        Err(bnbforge_core::BnbError::Plugin("bad bound".to_string()))
    );
}

#[test]
fn test_nested_steal_chain_completes_bottom_up() {
    const CHAIN: usize = 6;

    // Build a chain where task k+1 was stolen from task k.
    let mut indices = Vec::new();
    let mut descriptors = Vec::new();
    let mut current = root_index(StealChunk::Single);
    current.set_num_children(2);
    for _ in 0..CHAIN {
        let stolen = current.steal().unwrap();
        let mut next = PositionIndex::for_task(&stolen, StealChunk::Single);
        next.set_num_children(2);
        indices.push(current);
        descriptors.push(stolen);
        current = next;
    }
    indices.push(current);

    let order = Arc::new(Mutex::new(Vec::new()));
    let mut handles = Vec::new();
    // Task k is fulfilled through descriptors[k - 1]; task 0 is the root.
    let mut completions: Vec<Option<crate::completion::CompletionHandle>> = vec![None];
    completions.extend(descriptors.into_iter().map(|d| Some(d.completion)));

    let (root_handle, root_future) = completion();
    completions[0] = Some(root_handle);

    for (k, (mut index, handle)) in indices.into_iter().zip(completions).enumerate().rev() {
        let order = Arc::clone(&order);
        handles.push(thread::spawn(move || {
            let result = index.wait_futures();
            order.lock().unwrap().push(k);
            if let Some(handle) = handle {
                handle.complete(result);
            }
        }));
    }

    assert_eq!(root_future.wait(), Ok(()));
    for handle in handles {
        handle.join().unwrap();
    }
    let order = order.lock().unwrap().clone();
    let expected: Vec<usize> = (0..=CHAIN).rev().collect();
    assert_eq!(order, expected);
}
