//! The [`CommitGraph`] trait: the history boundary the merge core reads from.
//!
//! Implementations resolve ref strings to commits, load commits by hash, and
//! optionally expose precomputed ancestor closures. The trait is object-safe
//! so callers can hold `&dyn CommitGraph`.
//!
//! # Closures
//!
//! A [`CommitClosure`] is the set of `(height, hash)` pairs of every commit
//! reachable from some commit, itself included. Ordering by height first
//! lets merge-base search walk one closure from the top down and stop at the
//! first height level that intersects the other. Graphs that cannot provide
//! closures cheaply return `Ok(None)` and callers fall back to a
//! height-bounded walk.

use std::collections::BTreeSet;

use crate::commit::Commit;
use crate::error::StoreError;
use crate::hash::ContentHash;

// ---------------------------------------------------------------------------
// CommitClosure
// ---------------------------------------------------------------------------

/// Ancestor membership set keyed by `(height, hash)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitClosure(BTreeSet<(u64, ContentHash)>);

impl CommitClosure {
    /// An empty closure.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the closure of `commit` by walking `graph`.
    ///
    /// # Errors
    /// Propagates failures to load a parent commit.
    pub fn compute(graph: &dyn CommitGraph, commit: &Commit) -> Result<Self, StoreError> {
        let mut closure = Self::new();
        let mut stack = vec![commit.clone()];
        while let Some(c) = stack.pop() {
            if !closure.0.insert((c.height(), c.hash())) {
                continue;
            }
            for parent in c.parents() {
                stack.push(graph.commit(parent)?);
            }
        }
        Ok(closure)
    }

    /// Add an entry.
    pub fn insert(&mut self, height: u64, hash: ContentHash) {
        self.0.insert((height, hash));
    }

    /// Membership test.
    #[must_use]
    pub fn contains(&self, hash: &ContentHash, height: u64) -> bool {
        self.0.contains(&(height, *hash))
    }

    /// Number of commits in the closure.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the closure is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries from the greatest height down; within a height, ascending by
    /// hash.
    pub fn iter_by_height_desc(&self) -> impl Iterator<Item = (u64, ContentHash)> + '_ {
        let mut heights: Vec<u64> = self.0.iter().map(|(h, _)| *h).collect();
        heights.dedup();
        heights.into_iter().rev().flat_map(move |height| {
            self.0
                .range((height, ContentHash::ZERO)..=(height, ContentHash::from_bytes([0xff; 20])))
                .copied()
        })
    }
}

// ---------------------------------------------------------------------------
// CommitGraph
// ---------------------------------------------------------------------------

/// Read access to commit history.
pub trait CommitGraph: Sync {
    /// Resolve a ref name, hash, or hash prefix (optionally with `~N` / `^`
    /// ancestry suffixes) to a commit.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if nothing matches.
    fn resolve(&self, spec: &str) -> Result<Commit, StoreError>;

    /// Load a commit by hash.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if the hash is unknown.
    fn commit(&self, hash: &ContentHash) -> Result<Commit, StoreError>;

    /// Load a commit's parents, mainline first.
    ///
    /// # Errors
    /// Propagates [`CommitGraph::commit`] failures.
    fn parents(&self, commit: &Commit) -> Result<Vec<Commit>, StoreError> {
        commit.parents().iter().map(|p| self.commit(p)).collect()
    }

    /// Topological height of a commit.
    fn height(&self, commit: &Commit) -> u64 {
        commit.height()
    }

    /// The ancestor closure of `commit`, if the graph can provide one.
    ///
    /// # Errors
    /// Propagates storage failures.
    fn ancestor_closure(&self, commit: &Commit) -> Result<Option<CommitClosure>, StoreError>;
}
