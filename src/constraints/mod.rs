//! Post-merge constraint verification.
//!
//! A merge can combine two individually valid sides into an invalid whole:
//! both sides insert the same unique value under different keys, or one side
//! deletes a parent row another side starts referencing, or one side makes a
//! column NOT NULL while the other inserts `NULL` into it. [`verify_constraints`]
//! finds such rows and records them as [`ConstraintViolation`]s in each
//! table's violation partition. Finding violations is not an error.
//!
//! # Modes
//!
//! - [`VerifyMode::Full`]: check every row of every listed table, replacing
//!   the tables' violation partitions.
//! - [`VerifyMode::Incremental`]: check only rows that differ from the
//!   comparison root, plus child rows whose referenced parent rows went away;
//!   new violations are added to the existing partitions.
//!
//! [`ConstraintViolation`]: vtmerge_store::ConstraintViolation

pub mod foreign_key;
pub mod not_null;
pub mod unique;

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::{debug, instrument};
use vtmerge_store::{
    CellLocation, ColumnTag, RootValue, RowValue, Schema, StoreError, Table, TableName, Tuple,
    Value,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Verification could not run.
#[derive(Debug, Error)]
pub enum ConstraintError {
    /// A listed table, or a table a foreign key refers to, does not exist.
    #[error("table '{table}' not found while verifying constraints")]
    MissingTable {
        /// The missing table.
        table: TableName,
    },
    /// A constraint refers to a column the table does not have.
    #[error("constraint '{constraint}' on table '{table}' refers to missing column {tag}")]
    MissingColumn {
        /// The table.
        table: TableName,
        /// Index or foreign-key name.
        constraint: String,
        /// The missing column tag.
        tag: ColumnTag,
    },
    /// A storage collaborator failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// How much of each table to check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifyMode {
    /// Only rows changed relative to the comparison root.
    Incremental,
    /// Every row.
    Full,
}

/// What [`verify_constraints`] produced.
#[derive(Clone, Debug)]
pub struct VerifyOutcome {
    /// The working root with violation partitions updated.
    pub root: RootValue,
    /// Checked tables that hold at least one violation.
    pub violating_tables: BTreeSet<TableName>,
    /// Violation count per checked table.
    pub counts: BTreeMap<TableName, u64>,
}

/// Check NOT NULL, unique and foreign-key constraints of `tables` in
/// `working`.
///
/// `comparison` is the root the incremental mode diffs against, normally our
/// side's pre-merge root.
///
/// # Errors
/// [`ConstraintError::MissingTable`] if a listed table or a referenced parent
/// table is absent; [`ConstraintError::MissingColumn`] if a constraint names
/// a column its table lacks.
#[instrument(skip_all, fields(tables = tables.len(), mode = ?mode))]
pub fn verify_constraints(
    working: &RootValue,
    comparison: &RootValue,
    tables: &[TableName],
    mode: VerifyMode,
) -> Result<VerifyOutcome, ConstraintError> {
    let mut root = working.clone();
    let mut violating_tables = BTreeSet::new();
    let mut counts = BTreeMap::new();
    for name in tables {
        let table = working
            .get_table(name)
            .ok_or_else(|| ConstraintError::MissingTable { table: name.clone() })?;
        let changed = match mode {
            VerifyMode::Full => None,
            VerifyMode::Incremental => changed_keys(table, comparison.get_table(name)),
        };
        let mut found = not_null::not_null_violations(name, table, changed.as_ref())?;
        found.extend(unique::unique_violations(name, table, changed.as_ref())?);
        found.extend(foreign_key::foreign_key_violations(
            working,
            comparison,
            name,
            table,
            changed.as_ref(),
        )?);

        let mut violations = match mode {
            VerifyMode::Full => BTreeMap::new(),
            VerifyMode::Incremental => table.violations().clone(),
        };
        for v in found {
            violations.insert(v.id(), v);
        }
        let count = violations.len() as u64;
        debug!(table = %name, violations = count, "constraints checked");
        if count > 0 {
            violating_tables.insert(name.clone());
        }
        counts.insert(name.clone(), count);
        if &violations != table.violations() {
            root = root.put_table(name.clone(), table.with_violations(violations));
        }
    }
    Ok(VerifyOutcome {
        root,
        violating_tables,
        counts,
    })
}

/// Keys whose working row is new or different from the comparison table.
/// `None` means every row must be checked.
fn changed_keys(working: &Table, comparison: Option<&Table>) -> Option<BTreeSet<Tuple>> {
    let comparison = comparison?;
    if comparison.schema() != working.schema() {
        return None;
    }
    Some(
        working
            .rows()
            .iter()
            .filter(|(k, v)| comparison.rows().get(*k) != Some(*v))
            .map(|(k, _)| k.clone())
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Cell projection helpers
// ---------------------------------------------------------------------------

/// Locate every tag of a constraint in `schema`.
pub(crate) fn locate_all(
    table: &TableName,
    schema: &Schema,
    constraint: &str,
    tags: &[ColumnTag],
) -> Result<Vec<CellLocation>, ConstraintError> {
    tags.iter()
        .map(|tag| {
            schema.locate(*tag).ok_or_else(|| ConstraintError::MissingColumn {
                table: table.clone(),
                constraint: constraint.to_owned(),
                tag: *tag,
            })
        })
        .collect()
}

/// The constrained cells of one row, or `None` if any of them is `NULL`.
pub(crate) fn project(key: &Tuple, row: &RowValue, locs: &[CellLocation]) -> Option<Tuple> {
    let mut out = Vec::with_capacity(locs.len());
    for loc in locs {
        let cell = match loc {
            CellLocation::Key(i) => key.get(*i),
            CellLocation::Value(i) => row.cells.get(*i),
        };
        match cell {
            Some(v) if !v.is_null() => out.push(v.clone()),
            _ => return None,
        }
    }
    Some(Tuple::new(out))
}

pub(crate) fn column_names(schema: &Schema, tags: &[ColumnTag]) -> Vec<String> {
    tags.iter()
        .map(|t| schema.column(*t).map_or_else(|| t.to_string(), |c| c.name.clone()))
        .collect()
}

pub(crate) fn tuple_json(t: &Tuple) -> serde_json::Value {
    serde_json::Value::Array(t.values().iter().map(Value::to_json).collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
