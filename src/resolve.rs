//! Resolve row conflicts by picking a side.
//!
//! Resolving a key replaces its working row with the chosen side's value
//! from the conflict entry, or removes the row when the chosen side had
//! deleted it, and clears the entry. Keys without a pending conflict are
//! ignored; if none of the requested keys had one, the call fails with
//! [`ResolveError::NoConflictsResolved`] so callers can tell a repeated
//! resolution from a successful one.

use thiserror::Error;
use tracing::{debug, instrument};
use vtmerge_store::{RootValue, StoreError, Table, TableName, Tuple};

use crate::merge::Side;

/// Conflict resolution failures.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// None of the requested keys had a pending conflict.
    #[error("no conflicts resolved: none of the {requested} requested keys has a pending conflict")]
    NoConflictsResolved {
        /// Number of keys requested.
        requested: usize,
    },
    /// The named table does not exist in the root.
    #[error("table '{table}' not found")]
    TableNotFound {
        /// The missing table.
        table: TableName,
    },
    /// A storage collaborator failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolve the conflicts of `keys` in `table` in favour of `side`.
///
/// # Errors
/// [`ResolveError::NoConflictsResolved`] if no listed key had a conflict.
#[instrument(skip_all, fields(keys = keys.len(), %side))]
pub fn resolve_conflicts(table: &Table, keys: &[Tuple], side: Side) -> Result<Table, ResolveError> {
    let mut parts = table.to_parts();
    let mut resolved = 0usize;
    for key in keys {
        let Some(entry) = parts.conflicts.remove(key) else {
            continue;
        };
        let chosen = match side {
            Side::Ours => entry.ours,
            Side::Theirs => entry.theirs,
        };
        match chosen {
            Some(row) => parts.rows.insert(key.clone(), row),
            None => parts.rows.remove(key),
        };
        resolved += 1;
    }
    if resolved == 0 {
        return Err(ResolveError::NoConflictsResolved {
            requested: keys.len(),
        });
    }
    debug!(resolved, "conflicts resolved");
    Ok(Table::from_parts(parts))
}

/// Resolve every pending conflict of `table` in favour of `side`.
///
/// # Errors
/// [`ResolveError::NoConflictsResolved`] if the table has no conflicts.
pub fn resolve_all(table: &Table, side: Side) -> Result<Table, ResolveError> {
    let keys: Vec<Tuple> = table.conflicts().keys().cloned().collect();
    resolve_conflicts(table, &keys, side)
}

/// Resolve conflicts of one table inside a root, returning the new root.
///
/// # Errors
/// [`ResolveError::TableNotFound`] if `name` is not in `root`, otherwise as
/// [`resolve_conflicts`].
pub fn resolve_in_root(
    root: &RootValue,
    name: &TableName,
    keys: &[Tuple],
    side: Side,
) -> Result<RootValue, ResolveError> {
    let table = root
        .get_table(name)
        .ok_or_else(|| ResolveError::TableNotFound { table: name.clone() })?;
    let resolved = resolve_conflicts(table, keys, side)?;
    Ok(root.put_table(name.clone(), resolved))
}
