//! Merge error types.
//!
//! [`MergeError`] covers the fatal outcomes of a merge. Row conflicts and
//! constraint violations are never errors: they are written into the merged
//! tables and reported through
//! [`MergeResult`](crate::merge::MergeResult). Each message says what went
//! wrong and, where there is one, what to do about it.

use thiserror::Error;
use vtmerge_store::{ContentHash, StoreError, TableName};

use crate::constraints::ConstraintError;
use crate::model::conflict::SchemaConflict;

/// Fatal merge failures. On any of these no merged root is produced.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The two commits share no ancestor, so there is no base to merge
    /// against.
    #[error(
        "commits {} and {} share no common history\n  To fix: merge only branches that descend from a common commit.",
        .left.short(12),
        .right.short(12)
    )]
    NoCommonHistory {
        /// Left commit.
        left: ContentHash,
        /// Right commit.
        right: ContentHash,
    },

    /// A table has schema conflicts and the caller did not ask to keep them.
    #[error(
        "schema conflict in table '{table}': {}\n  To fix: reconcile the schemas, or merge with keep_schema_conflicts to record and skip the table.",
        join_conflicts(.conflicts)
    )]
    SchemaConflict {
        /// The conflicting table.
        table: TableName,
        /// Every conflict found on that table.
        conflicts: Vec<SchemaConflict>,
    },

    /// A primary key changed and the caller asked for strict handling.
    #[error(
        "primary key of table '{table}' changed ({detail}); rows cannot be matched across sides\n  To fix: merge without strict_primary_keys to skip the table with a warning."
    )]
    PrimaryKeyChange {
        /// The affected table.
        table: TableName,
        /// Old and new key definitions.
        detail: String,
    },

    /// The merge options contradict each other.
    #[error("incompatible merge options: {message}")]
    IncompatibleOptions {
        /// Which options clash.
        message: String,
    },

    /// Our side still has unresolved conflicts from an earlier merge.
    #[error(
        "tables with unresolved conflicts: {}\n  To fix: resolve the pending conflicts before merging again.",
        .tables.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    )]
    UnresolvedConflicts {
        /// Tables carrying conflicts.
        tables: Vec<TableName>,
    },

    /// The merge was cancelled before every table was scheduled.
    #[error("merge cancelled")]
    Cancelled,

    /// Post-merge constraint verification failed.
    #[error(transparent)]
    Constraint(#[from] ConstraintError),

    /// A storage collaborator failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl MergeError {
    /// Returns `true` for [`MergeError::NoCommonHistory`].
    #[must_use]
    pub const fn is_no_common_history(&self) -> bool {
        matches!(self, Self::NoCommonHistory { .. })
    }
}

fn join_conflicts(conflicts: &[SchemaConflict]) -> String {
    conflicts
        .iter()
        .map(|c| c.kind.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
