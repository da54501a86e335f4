//! Commits: immutable history nodes pointing at a root value.

use std::sync::Arc;

use serde::Serialize;

use crate::hash::{ContentHash, ContentHasher};
use crate::root::RootValue;

/// Commit metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CommitMeta {
    /// Author name and address.
    pub author: String,
    /// Commit message.
    pub message: String,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
}

impl CommitMeta {
    /// Metadata with just a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug)]
struct CommitInner {
    hash: ContentHash,
    parents: Vec<ContentHash>,
    height: u64,
    meta: CommitMeta,
    root: RootValue,
}

/// An immutable commit.
///
/// Height is 1 for a root commit and `1 + max(parent heights)` otherwise, so
/// every ancestor of a commit has a strictly smaller height than the commit.
#[derive(Clone, Debug)]
pub struct Commit(Arc<CommitInner>);

impl Commit {
    /// Create a commit on top of `parents`. The first parent is the
    /// mainline; further parents are merged-in branches.
    #[must_use]
    pub fn new(parents: &[&Self], meta: CommitMeta, root: RootValue) -> Self {
        let height = parents.iter().map(|p| p.height()).max().unwrap_or(0) + 1;
        let parent_hashes: Vec<ContentHash> = parents.iter().map(|p| p.hash()).collect();
        let mut h = ContentHasher::new();
        h.write_tag(b'C');
        h.write_hash(&root.hash_of());
        h.write_u64(parent_hashes.len() as u64);
        for p in &parent_hashes {
            h.write_hash(p);
        }
        h.write_str(&meta.author);
        h.write_str(&meta.message);
        h.write_bytes(&meta.timestamp.to_be_bytes());
        Self(Arc::new(CommitInner {
            hash: h.finish(),
            parents: parent_hashes,
            height,
            meta,
            root,
        }))
    }

    /// Content hash.
    #[must_use]
    pub fn hash(&self) -> ContentHash {
        self.0.hash
    }

    /// Parent hashes, mainline first.
    #[must_use]
    pub fn parents(&self) -> &[ContentHash] {
        &self.0.parents
    }

    /// Topological height.
    #[must_use]
    pub fn height(&self) -> u64 {
        self.0.height
    }

    /// Metadata.
    #[must_use]
    pub fn meta(&self) -> &CommitMeta {
        &self.0.meta
    }

    /// The snapshot this commit points at.
    #[must_use]
    pub fn root(&self) -> &RootValue {
        &self.0.root
    }

    /// Returns `true` for commits with two or more parents.
    #[must_use]
    pub fn is_merge(&self) -> bool {
        self.0.parents.len() > 1
    }
}

impl PartialEq for Commit {
    fn eq(&self, other: &Self) -> bool {
        self.0.hash == other.0.hash
    }
}

impl Eq for Commit {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_is_one_past_tallest_parent() {
        let root = RootValue::empty();
        let a = Commit::new(&[], CommitMeta::message("a"), root.clone());
        let b = Commit::new(&[&a], CommitMeta::message("b"), root.clone());
        let c = Commit::new(&[&b], CommitMeta::message("c"), root.clone());
        let m = Commit::new(&[&a, &c], CommitMeta::message("m"), root);
        assert_eq!(a.height(), 1);
        assert_eq!(c.height(), 3);
        assert_eq!(m.height(), 4);
        assert!(m.is_merge());
        assert_eq!(m.parents(), &[a.hash(), c.hash()]);
    }

    #[test]
    fn hash_covers_message_and_parents() {
        let root = RootValue::empty();
        let a = Commit::new(&[], CommitMeta::message("a"), root.clone());
        let a2 = Commit::new(&[], CommitMeta::message("a2"), root.clone());
        let b = Commit::new(&[&a], CommitMeta::message("a"), root);
        assert_ne!(a.hash(), a2.hash());
        assert_ne!(a.hash(), b.hash());
    }
}
