//! Merge-base resolution.
//!
//! The merge base of two commits is the common ancestor with the greatest
//! height. When several common ancestors tie at that height (criss-cross
//! merges), the one with the lexicographically smallest hash wins. True
//! lowest common ancestors are not unique in a general DAG; this rule picks
//! one valid candidate and always the same one.
//!
//! # Strategies
//!
//! - **Closure intersection**: when the graph serves ancestor closures, walk
//!   the left closure from the top height down and stop at the first height
//!   level that intersects the right closure.
//! - **Height-bounded walk**: otherwise, paint ancestors of both commits in
//!   descending height order. Once a commit reachable from both sides is
//!   found at height `h`, nothing below `h` can beat it, so the walk stops as
//!   soon as the frontier drops below `h`.
//!
//! # Determinism
//!
//! Both strategies return the same commit for the same pair, and the result
//! is symmetric: `merge_base(a, b) == merge_base(b, a)`.

use std::collections::{BTreeSet, BinaryHeap, HashMap};

use tracing::{debug, instrument};
use vtmerge_store::{Commit, CommitClosure, CommitGraph, ContentHash, StoreError};

use crate::error::MergeError;

const LEFT: u8 = 0b01;
const RIGHT: u8 = 0b10;
const BOTH: u8 = LEFT | RIGHT;

/// Compute the merge base of `left` and `right`.
///
/// # Errors
/// [`MergeError::NoCommonHistory`] if the commits share no ancestor;
/// storage failures propagate as [`MergeError::Store`].
#[instrument(skip_all, fields(left = %left.hash().short(12), right = %right.hash().short(12)))]
pub fn merge_base(
    graph: &dyn CommitGraph,
    left: &Commit,
    right: &Commit,
) -> Result<Commit, MergeError> {
    if left == right {
        return Ok(left.clone());
    }
    let found = match (graph.ancestor_closure(left)?, graph.ancestor_closure(right)?) {
        (Some(l), Some(r)) => closure_merge_base(&l, &r),
        _ => {
            debug!("closures unavailable, walking history");
            walk_merge_base(graph, left, right)?
        }
    };
    match found {
        Some(hash) => {
            debug!(base = %hash.short(12), "merge base found");
            Ok(graph.commit(&hash)?)
        }
        None => Err(MergeError::NoCommonHistory {
            left: left.hash(),
            right: right.hash(),
        }),
    }
}

/// Whether `ancestor` is reachable from `descendant` (a commit is its own
/// ancestor).
///
/// # Errors
/// Storage failures while loading commits.
pub fn is_ancestor(
    graph: &dyn CommitGraph,
    ancestor: &Commit,
    descendant: &Commit,
) -> Result<bool, StoreError> {
    if ancestor == descendant {
        return Ok(true);
    }
    if ancestor.height() >= descendant.height() {
        return Ok(false);
    }
    if let Some(closure) = graph.ancestor_closure(descendant)? {
        return Ok(closure.contains(&ancestor.hash(), ancestor.height()));
    }
    let mut seen = BTreeSet::new();
    let mut stack = vec![descendant.clone()];
    while let Some(c) = stack.pop() {
        if c == *ancestor {
            return Ok(true);
        }
        if c.height() <= ancestor.height() || !seen.insert(c.hash()) {
            continue;
        }
        stack.extend(graph.parents(&c)?);
    }
    Ok(false)
}

/// Highest common entry of two closures, smallest hash first on ties.
fn closure_merge_base(left: &CommitClosure, right: &CommitClosure) -> Option<ContentHash> {
    left.iter_by_height_desc()
        .find(|(height, hash)| right.contains(hash, *height))
        .map(|(_, hash)| hash)
}

/// Paint-down walk over both histories in descending height order.
fn walk_merge_base(
    graph: &dyn CommitGraph,
    left: &Commit,
    right: &Commit,
) -> Result<Option<ContentHash>, StoreError> {
    let mut flags: HashMap<ContentHash, u8> = HashMap::new();
    let mut done: BTreeSet<ContentHash> = BTreeSet::new();
    let mut queue: BinaryHeap<(u64, ContentHash)> = BinaryHeap::new();
    let mut best: Option<(u64, ContentHash)> = None;

    flags.insert(left.hash(), LEFT);
    queue.push((left.height(), left.hash()));
    *flags.entry(right.hash()).or_insert(0) |= RIGHT;
    queue.push((right.height(), right.hash()));

    while let Some((height, hash)) = queue.pop() {
        if let Some((best_height, _)) = best {
            if height < best_height {
                break;
            }
        }
        if !done.insert(hash) {
            continue;
        }
        let mark = flags.get(&hash).copied().unwrap_or(0);
        if mark == BOTH {
            // Same height as any earlier candidate; keep the smaller hash.
            best = match best {
                Some((h, b)) if b <= hash => Some((h, b)),
                _ => Some((height, hash)),
            };
            continue;
        }
        let commit = graph.commit(&hash)?;
        for parent in graph.parents(&commit)? {
            let entry = flags.entry(parent.hash()).or_insert(0);
            if *entry | mark != *entry {
                *entry |= mark;
                queue.push((parent.height(), parent.hash()));
            }
        }
    }
    Ok(best.map(|(_, hash)| hash))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
