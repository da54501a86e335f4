//! Per-table merge.
//!
//! [`merge_table`] decides what happens to one table given its base, ours,
//! and theirs versions (any of which may be absent). Cheap table-level checks
//! run first, comparing presence and content hashes; only when both sides
//! changed a table present everywhere does it fall through to schema merge
//! and the row differ.
//!
//! # Short-circuits
//!
//! | base | ours | theirs | Outcome |
//! |------|------|--------|---------|
//! | x | x | x | unmodified |
//! | any | y | y | unmodified (keyed tables) |
//! | - | y | - | unmodified |
//! | - | - | y | added from theirs |
//! | - | y | z | merged against an empty base, or conflict if schemas differ |
//! | x | - | - | removed |
//! | x | - / x | x / - | removed |
//! | x | - / y | y / - | deleted-and-modified conflict |
//! | x | y | x | unmodified |
//! | x | x | y | taken from theirs |
//!
//! # Output
//!
//! The merged table starts from our rows, remapped into the merged schema;
//! row diffs are applied on top and counted into [`MergeStats`]. A
//! conflicting key keeps our value as its working row and gains an entry in
//! the conflict partition.

use tracing::{debug, instrument, warn};
use vtmerge_store::{Table, TableName, TableParts, next_auto_increment};

use super::diff::{RowChange, RowMapping, remap_rows, three_way_diff};
use super::schema::{merge_schema, primary_key_conflict};
use super::types::MergeOptions;
use crate::error::MergeError;
use crate::model::conflict::{SchemaConflict, SchemaConflictKind};
use crate::model::stats::{MergeStats, TableOperation};

/// Result of merging one table.
#[derive(Clone, Debug)]
pub struct TableMergeOutcome {
    /// The merged table, or `None` if the table is absent from the result.
    pub table: Option<Table>,
    /// Counters and table-level operation.
    pub stats: MergeStats,
    /// Schema conflicts recorded for a skipped table.
    pub schema_conflicts: Vec<SchemaConflict>,
}

impl TableMergeOutcome {
    fn keep(table: Option<&Table>, operation: TableOperation) -> Self {
        Self {
            table: table.cloned(),
            stats: MergeStats::with_operation(operation),
            schema_conflicts: Vec::new(),
        }
    }

    fn skipped(ours: Option<&Table>, conflicts: Vec<SchemaConflict>) -> Self {
        let mut stats = MergeStats::with_operation(TableOperation::Skipped);
        stats.schema_conflicts = conflicts.len() as u64;
        Self {
            table: ours.cloned(),
            stats,
            schema_conflicts: conflicts,
        }
    }
}

/// Merge one table.
///
/// # Errors
/// [`MergeError::SchemaConflict`] when the table's schemas conflict and
/// `keep_schema_conflicts` is off; [`MergeError::PrimaryKeyChange`] when a
/// side changed the primary key and `strict_primary_keys` is on; schema
/// validation failures as [`MergeError::Store`].
#[instrument(skip_all, fields(table = %name))]
pub fn merge_table(
    name: &TableName,
    base: Option<&Table>,
    ours: Option<&Table>,
    theirs: Option<&Table>,
    opts: &MergeOptions,
) -> Result<TableMergeOutcome, MergeError> {
    let (base, ours, theirs) = match (base, ours, theirs) {
        (_, Some(o), Some(t)) if o.same_content(t) && !o.schema().is_keyless() => {
            debug!("identical on both sides");
            return Ok(TableMergeOutcome::keep(Some(o), TableOperation::Unmodified));
        }
        (None, Some(o), None) => {
            return Ok(TableMergeOutcome::keep(Some(o), TableOperation::Unmodified));
        }
        (None, None, Some(t)) => {
            let mut outcome = TableMergeOutcome::keep(Some(t), TableOperation::Added);
            outcome.stats.adds = t.rows().row_count();
            return Ok(outcome);
        }
        (None, None, None) => return Ok(TableMergeOutcome::keep(None, TableOperation::Unmodified)),
        (None, Some(o), Some(t)) => {
            if o.schema() != t.schema() {
                let conflict = SchemaConflict::new(
                    name.clone(),
                    SchemaConflictKind::TableAddedOnBothSides,
                    "created on both sides with different schemas",
                );
                return schema_conflicts(name, Some(o), vec![conflict], opts);
            }
            let empty = Table::empty(o.schema().clone());
            return merge_rows(name, &empty, o, t, opts);
        }
        (Some(_), None, None) => return Ok(TableMergeOutcome::keep(None, TableOperation::Removed)),
        (Some(b), None, Some(t)) | (Some(b), Some(t), None) => {
            let dropped_by_ours = ours.is_none();
            if !t.same_content(b) {
                let detail = if dropped_by_ours {
                    "dropped by ours, modified by theirs"
                } else {
                    "dropped by theirs, modified by ours"
                };
                let conflict = SchemaConflict::new(
                    name.clone(),
                    SchemaConflictKind::TableDeletedAndModified,
                    detail,
                );
                return schema_conflicts(name, ours, vec![conflict], opts);
            }
            let mut outcome = TableMergeOutcome::keep(None, TableOperation::Removed);
            if let Some(o) = ours {
                outcome.stats.deletes = o.rows().row_count();
            }
            return Ok(outcome);
        }
        (Some(b), Some(o), Some(t)) => (b, o, t),
    };

    if theirs.same_content(base) {
        debug!("unchanged on their side");
        return Ok(TableMergeOutcome::keep(Some(ours), TableOperation::Unmodified));
    }
    if ours.same_content(base) {
        debug!("unchanged on our side, taking theirs");
        let mut outcome = TableMergeOutcome::keep(Some(theirs), TableOperation::Modified);
        count_two_way(&mut outcome.stats, ours, theirs);
        return Ok(outcome);
    }

    if let Some(conflict) =
        primary_key_conflict(name, base.schema(), ours.schema(), theirs.schema())
    {
        if opts.strict_primary_keys {
            return Err(MergeError::PrimaryKeyChange {
                table: name.clone(),
                detail: conflict.detail,
            });
        }
        warn!(detail = %conflict.detail, "primary key changed; skipping data merge");
        return Ok(TableMergeOutcome::skipped(Some(ours), vec![conflict]));
    }
    merge_rows(name, base, ours, theirs, opts)
}

fn schema_conflicts(
    name: &TableName,
    ours: Option<&Table>,
    conflicts: Vec<SchemaConflict>,
    opts: &MergeOptions,
) -> Result<TableMergeOutcome, MergeError> {
    if !opts.keep_schema_conflicts {
        return Err(MergeError::SchemaConflict {
            table: name.clone(),
            conflicts,
        });
    }
    warn!(conflicts = conflicts.len(), "schema conflict; keeping our side");
    Ok(TableMergeOutcome::skipped(ours, conflicts))
}

/// Stats for replacing `ours` wholesale with `theirs`.
fn count_two_way(stats: &mut MergeStats, ours: &Table, theirs: &Table) {
    let mapping = RowMapping::between(ours.schema(), theirs.schema());
    let keyless = theirs.schema().is_keyless();
    let ours_rows = remap_rows(ours.rows(), &mapping, keyless);
    for (key, row) in theirs.rows() {
        match ours_rows.get(key) {
            None => stats.adds += 1,
            Some(prev) if prev != row => stats.modifications += 1,
            Some(_) => {}
        }
    }
    stats.deletes = ours_rows
        .iter()
        .filter(|(key, _)| !theirs.rows().contains(key))
        .count() as u64;
}

fn merge_rows(
    name: &TableName,
    base: &Table,
    ours: &Table,
    theirs: &Table,
    opts: &MergeOptions,
) -> Result<TableMergeOutcome, MergeError> {
    let merged = merge_schema(name, base.schema(), ours.schema(), theirs.schema())?;
    if !merged.is_clean() {
        return schema_conflicts(name, Some(ours), merged.conflicts, opts);
    }
    let schema = merged.schema;
    let mut parts: TableParts = ours.to_parts();
    if parts.schema != schema {
        let mapping = RowMapping::between(ours.schema(), &schema);
        parts.rows = remap_rows(ours.rows(), &mapping, schema.is_keyless());
    }

    let mut stats = MergeStats::unmodified();
    for diff in three_way_diff(&schema, base, ours, theirs) {
        if let Some(entry) = diff.conflict_entry() {
            stats.data_conflicts += 1;
            parts.conflicts.insert(diff.key.clone(), entry);
            continue;
        }
        match diff.change() {
            Some(RowChange::Added) => stats.adds += 1,
            Some(RowChange::Modified) => stats.modifications += 1,
            Some(RowChange::Deleted) => stats.deletes += 1,
            None => continue,
        }
        match diff.merged {
            Some(row) => parts.rows.insert(diff.key, row),
            None => parts.rows.remove(&diff.key),
        };
    }

    parts.auto_increment = ours
        .auto_increment()
        .max(theirs.auto_increment())
        .max(next_auto_increment(&schema, &parts.rows));
    if schema.auto_increment_column().is_none() {
        parts.auto_increment = 0;
    }
    parts.schema = schema;
    let table = Table::from_parts(parts);
    stats.operation = if table.same_content(ours) {
        TableOperation::Unmodified
    } else {
        TableOperation::Modified
    };
    debug!(%stats, "table merged");
    Ok(TableMergeOutcome {
        table: Some(table),
        stats,
        schema_conflicts: Vec::new(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
