//! Three-way merge of two commits.
//!
//! [`merge`] is the entry point. It resolves the cheap outcomes first and
//! only then runs the full pipeline:
//!
//! - **up to date**: the commits are equal, or `right` is an ancestor of
//!   `left`. The result is `left`'s root.
//! - **fast-forward**: `left` is an ancestor of `right` (and `no_ff` is off).
//!   The result is `right`'s root, found by an ancestry query without diffing
//!   a single table.
//! - **merge**: compute the merge base ([`base`]), then merge every table
//!   ([`roots`], [`table`]) through schema merge ([`schema`]) and the row
//!   differ ([`diff`], [`value`]), then foreign keys ([`foreign_keys`]) and
//!   constraint verification.
//!
//! # Determinism guarantee
//!
//! The same commits and options always produce the same merged root:
//!
//! - Tables are assembled in name order, whatever order workers finish in.
//! - Rows are walked in key order.
//! - Merge-base ties resolve to the smallest hash.

pub mod base;
pub mod diff;
pub mod foreign_keys;
pub mod roots;
pub mod schema;
pub mod stomp;
pub mod table;
pub mod types;
pub mod value;

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, instrument};
use vtmerge_store::{Commit, CommitGraph, ContentHash, RootValue, TableName};

use crate::error::MergeError;
use crate::model::conflict::SchemaConflict;
use crate::model::stats::MergeStats;

pub use base::{is_ancestor, merge_base};
pub use roots::{RootsMerge, merge_roots};
pub use stomp::merge_would_stomp_changes;
pub use types::{MergeContext, MergeEvent, MergeObserver, MergeOptions, Side};


// ---------------------------------------------------------------------------
// MergeResult
// ---------------------------------------------------------------------------

/// Outcome of a successful [`merge`].
#[derive(Clone, Debug)]
pub struct MergeResult {
    /// The merged root.
    pub root: RootValue,
    /// Per-table stats. Empty for up-to-date and fast-forward results.
    pub stats: BTreeMap<TableName, MergeStats>,
    /// Schema conflicts recorded for skipped tables.
    pub schema_conflicts: Vec<SchemaConflict>,
    /// Tables holding constraint violations.
    pub violating_tables: BTreeSet<TableName>,
    /// Nothing to merge: `right` is already part of `left`.
    pub up_to_date: bool,
    /// `left` was an ancestor of `right`; the result is `right`'s root.
    pub fast_forwarded: bool,
    /// The merge base, when one was needed or known.
    pub base: Option<ContentHash>,
    /// Our commit.
    pub left: ContentHash,
    /// Their commit.
    pub right: ContentHash,
    /// Whether the eventual commit drops the merge-parent link.
    pub squash: bool,
}

impl MergeResult {
    fn shortcut(left: &Commit, right: &Commit, opts: &MergeOptions, root: &RootValue) -> Self {
        Self {
            root: root.clone(),
            stats: BTreeMap::new(),
            schema_conflicts: Vec::new(),
            violating_tables: BTreeSet::new(),
            up_to_date: false,
            fast_forwarded: false,
            base: None,
            left: left.hash(),
            right: right.hash(),
            squash: opts.squash,
        }
    }

    /// Parents of the commit that records this merge: `[left]` for a squash,
    /// `[left, right]` otherwise.
    #[must_use]
    pub fn commit_parents(&self) -> Vec<ContentHash> {
        if self.squash {
            vec![self.left]
        } else {
            vec![self.left, self.right]
        }
    }

    /// Tables with unresolved row conflicts in the merged root.
    #[must_use]
    pub fn conflicted_tables(&self) -> Vec<TableName> {
        self.root.tables_in_conflict()
    }

    /// Returns `true` if anything needs the caller's attention: row
    /// conflicts, skipped tables, or constraint violations.
    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        !self.schema_conflicts.is_empty()
            || !self.violating_tables.is_empty()
            || self.stats.values().any(|s| s.data_conflicts > 0)
    }
}

// ---------------------------------------------------------------------------
// merge
// ---------------------------------------------------------------------------

/// Merge `right` into `left`.
///
/// # Errors
/// [`MergeError::IncompatibleOptions`] for contradictory options,
/// [`MergeError::UnresolvedConflicts`] if `left` still carries conflicts,
/// [`MergeError::NoCommonHistory`] for unrelated commits, and any fatal
/// table error from [`merge_roots`]. No root is returned on error.
#[instrument(skip_all, fields(left = %left.hash().short(12), right = %right.hash().short(12)))]
pub fn merge(
    graph: &dyn CommitGraph,
    left: &Commit,
    right: &Commit,
    opts: &MergeOptions,
    ctx: &MergeContext,
) -> Result<MergeResult, MergeError> {
    opts.validate()?;
    if left == right || is_ancestor(graph, right, left)? {
        debug!("up to date");
        let mut result = MergeResult::shortcut(left, right, opts, left.root());
        result.up_to_date = true;
        result.base = Some(right.hash());
        return Ok(result);
    }

    let pending = left.root().tables_in_conflict();
    if !pending.is_empty() {
        return Err(MergeError::UnresolvedConflicts { tables: pending });
    }

    if !opts.no_ff && is_ancestor(graph, left, right)? {
        debug!("fast-forward");
        let mut result = MergeResult::shortcut(left, right, opts, right.root());
        result.fast_forwarded = true;
        result.base = Some(left.hash());
        return Ok(result);
    }

    let base = merge_base(graph, left, right)?;
    let merged = merge_roots(base.root(), left.root(), right.root(), opts, ctx)?;
    let mut result = MergeResult::shortcut(left, right, opts, &merged.root);
    result.stats = merged.stats;
    result.schema_conflicts = merged.schema_conflicts;
    result.violating_tables = merged.violating_tables;
    result.base = Some(base.hash());
    info!(
        base = %base.hash().short(12),
        conflicts = result.has_conflicts(),
        "merge complete"
    );
    Ok(result)
}

/// Resolve two refs and [`merge`] them.
///
/// # Errors
/// Ref resolution failures as [`MergeError::Store`], otherwise as [`merge`].
pub fn merge_refs(
    graph: &dyn CommitGraph,
    left: &str,
    right: &str,
    opts: &MergeOptions,
    ctx: &MergeContext,
) -> Result<MergeResult, MergeError> {
    let left = graph.resolve(left)?;
    let right = graph.resolve(right)?;
    merge(graph, &left, &right, opts, ctx)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
