//! An in-memory [`CommitGraph`] used by tests, benchmarks, and the fixture
//! loader.

use std::collections::BTreeMap;

use tracing::trace;

use crate::commit::{Commit, CommitMeta};
use crate::error::StoreError;
use crate::graph::{CommitClosure, CommitGraph};
use crate::hash::ContentHash;
use crate::root::RootValue;

/// Minimum hash-prefix length accepted by [`MemoryGraph::resolve`].
const MIN_PREFIX: usize = 4;

/// Commits and refs held in memory.
#[derive(Clone, Debug)]
pub struct MemoryGraph {
    commits: BTreeMap<ContentHash, Commit>,
    refs: BTreeMap<String, ContentHash>,
    closures: bool,
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGraph {
    /// An empty graph that serves ancestor closures.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            commits: BTreeMap::new(),
            refs: BTreeMap::new(),
            closures: true,
        }
    }

    /// Stop serving closures so callers exercise the walking fallback.
    #[must_use]
    pub const fn without_closures(mut self) -> Self {
        self.closures = false;
        self
    }

    /// Store a commit.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if a parent is not already stored.
    pub fn insert(&mut self, commit: Commit) -> Result<ContentHash, StoreError> {
        if let Some(missing) = commit.parents().iter().find(|p| !self.commits.contains_key(p)) {
            return Err(StoreError::not_found(format!("parent commit {missing}")));
        }
        let hash = commit.hash();
        self.commits.insert(hash, commit);
        Ok(hash)
    }

    /// Create and store a commit on top of stored parents.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if a parent hash is unknown.
    pub fn commit_with(
        &mut self,
        parents: &[ContentHash],
        meta: CommitMeta,
        root: RootValue,
    ) -> Result<Commit, StoreError> {
        let parents = parents
            .iter()
            .map(|p| self.commit(p))
            .collect::<Result<Vec<_>, _>>()?;
        let refs: Vec<&Commit> = parents.iter().collect();
        let commit = Commit::new(&refs, meta, root);
        self.insert(commit.clone())?;
        Ok(commit)
    }

    /// Point a ref at a stored commit.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if the commit is unknown.
    pub fn set_ref(
        &mut self,
        name: impl Into<String>,
        hash: ContentHash,
    ) -> Result<(), StoreError> {
        if !self.commits.contains_key(&hash) {
            return Err(StoreError::not_found(format!("commit {hash}")));
        }
        self.refs.insert(name.into(), hash);
        Ok(())
    }

    /// All refs, sorted by name.
    #[must_use]
    pub fn refs(&self) -> &BTreeMap<String, ContentHash> {
        &self.refs
    }

    /// Number of stored commits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    /// Returns `true` if no commits are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    fn resolve_base(&self, spec: &str) -> Result<Commit, StoreError> {
        if let Some(hash) = self.refs.get(spec) {
            return self.commit(hash);
        }
        if let Ok(hash) = spec.parse::<ContentHash>() {
            return self.commit(&hash);
        }
        let lower = spec.to_ascii_lowercase();
        if lower.len() >= MIN_PREFIX && lower.bytes().all(|b| b.is_ascii_hexdigit()) {
            let mut matches = self
                .commits
                .iter()
                .filter(|(h, _)| h.to_string().starts_with(&lower));
            if let Some((_, commit)) = matches.next() {
                if matches.next().is_some() {
                    return Err(StoreError::not_found(format!("ambiguous commit prefix '{spec}'")));
                }
                return Ok(commit.clone());
            }
        }
        Err(StoreError::not_found(format!("ref or commit '{spec}'")))
    }
}

impl CommitGraph for MemoryGraph {
    fn resolve(&self, spec: &str) -> Result<Commit, StoreError> {
        let split = spec.find(['~', '^']).unwrap_or(spec.len());
        let (base, mut suffix) = spec.split_at(split);
        let mut commit = self.resolve_base(base)?;
        while !suffix.is_empty() {
            let (steps, rest) = if let Some(rest) = suffix.strip_prefix('^') {
                (1, rest)
            } else {
                let rest = &suffix[1..];
                let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
                let steps = if digits == 0 {
                    1
                } else {
                    rest[..digits].parse::<usize>().map_err(|_| {
                        StoreError::not_found(format!("ancestry suffix in '{spec}'"))
                    })?
                };
                (steps, &rest[digits..])
            };
            for _ in 0..steps {
                let first = commit
                    .parents()
                    .first()
                    .copied()
                    .ok_or_else(|| StoreError::not_found(format!("parent of {}", commit.hash())))?;
                commit = self.commit(&first)?;
            }
            suffix = rest;
        }
        trace!(spec, commit = %commit.hash(), "resolved");
        Ok(commit)
    }

    fn commit(&self, hash: &ContentHash) -> Result<Commit, StoreError> {
        self.commits
            .get(hash)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("commit {hash}")))
    }

    fn ancestor_closure(&self, commit: &Commit) -> Result<Option<CommitClosure>, StoreError> {
        if !self.closures {
            return Ok(None);
        }
        CommitClosure::compute(self, commit).map(Some)
    }
}
