//! Immutable, content-addressed tables.
//!
//! A [`Table`] is a schema, its rows, and the merge artifacts attached to
//! them (conflict and violation partitions, auto-increment counter). Tables
//! are shared by `Arc`; every "modification" builds a new table. The content
//! hash is computed on first use and cached, so equality checks between
//! tables on the same root or across roots are cheap after the first call.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use crate::artifacts::{ConflictEntry, ConstraintViolation, ViolationId, hash_conflict};
use crate::hash::{ContentHash, ContentHasher};
use crate::row::{RowSet, RowValue, Tuple, join_row};
use crate::schema::{CellLocation, Schema};
use crate::value::Value;

/// The owned contents of a table, used to build new tables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableParts {
    /// Table schema.
    pub schema: Schema,
    /// Working rows.
    pub rows: RowSet,
    /// Unresolved row conflicts, by key.
    pub conflicts: BTreeMap<Tuple, ConflictEntry>,
    /// Constraint violations, by identity.
    pub violations: BTreeMap<ViolationId, ConstraintViolation>,
    /// Next auto-increment value (0 when the table has no such column).
    pub auto_increment: u64,
}

#[derive(Debug)]
struct TableInner {
    parts: TableParts,
    hash: OnceLock<ContentHash>,
}

/// An immutable table snapshot.
#[derive(Clone, Debug)]
pub struct Table(Arc<TableInner>);

/// What a reader sees when looking up a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowState<'a> {
    /// No row and no pending conflict.
    Absent,
    /// A row with no pending conflict.
    Clean(&'a RowValue),
    /// The key has an unresolved conflict. `working` is the value currently
    /// stored (our side's pre-merge value), which is not a resolution.
    Conflicted {
        /// Stored working value, if any.
        working: Option<&'a RowValue>,
        /// The pending conflict.
        entry: &'a ConflictEntry,
    },
}

impl Table {
    /// A table with no artifacts. The auto-increment counter starts one past
    /// the largest value in the auto-increment column.
    #[must_use]
    pub fn new(schema: Schema, rows: RowSet) -> Self {
        let auto_increment = next_auto_increment(&schema, &rows);
        Self::from_parts(TableParts {
            schema,
            rows,
            conflicts: BTreeMap::new(),
            violations: BTreeMap::new(),
            auto_increment,
        })
    }

    /// An empty table with the given schema.
    #[must_use]
    pub fn empty(schema: Schema) -> Self {
        Self::new(schema, RowSet::new())
    }

    /// Build a table from its parts.
    #[must_use]
    pub fn from_parts(parts: TableParts) -> Self {
        Self(Arc::new(TableInner {
            parts,
            hash: OnceLock::new(),
        }))
    }

    /// Clone out the parts for building a modified copy.
    #[must_use]
    pub fn to_parts(&self) -> TableParts {
        self.0.parts.clone()
    }

    /// Table schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.0.parts.schema
    }

    /// Working rows in key order.
    #[must_use]
    pub fn rows(&self) -> &RowSet {
        &self.0.parts.rows
    }

    /// Pending row conflicts.
    #[must_use]
    pub fn conflicts(&self) -> &BTreeMap<Tuple, ConflictEntry> {
        &self.0.parts.conflicts
    }

    /// Recorded constraint violations.
    #[must_use]
    pub fn violations(&self) -> &BTreeMap<ViolationId, ConstraintViolation> {
        &self.0.parts.violations
    }

    /// Next auto-increment value.
    #[must_use]
    pub fn auto_increment(&self) -> u64 {
        self.0.parts.auto_increment
    }

    /// Returns `true` if any conflict is pending.
    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        !self.0.parts.conflicts.is_empty()
    }

    /// Returns `true` if any violation is recorded.
    #[must_use]
    pub fn has_violations(&self) -> bool {
        !self.0.parts.violations.is_empty()
    }

    /// Look up a key, surfacing pending conflicts.
    #[must_use]
    pub fn lookup(&self, key: &Tuple) -> RowState<'_> {
        let working = self.0.parts.rows.get(key);
        match (self.0.parts.conflicts.get(key), working) {
            (Some(entry), working) => RowState::Conflicted { working, entry },
            (None, Some(row)) => RowState::Clean(row),
            (None, None) => RowState::Absent,
        }
    }

    /// The full working row (schema column order) for a key.
    #[must_use]
    pub fn full_row(&self, key: &Tuple) -> Option<Vec<Value>> {
        let row = self.0.parts.rows.get(key)?;
        Some(join_row(self.schema(), key, &row.cells))
    }

    /// A single cell of a stored row, addressed by column tag.
    #[must_use]
    pub fn cell<'a>(&self, key: &'a Tuple, row: &'a RowValue, tag: u64) -> Option<&'a Value> {
        match self.schema().locate(tag)? {
            CellLocation::Key(i) => key.get(i),
            CellLocation::Value(i) => row.cells.get(i),
        }
    }

    /// Content hash over schema, rows, artifacts, and counter.
    pub fn hash_of(&self) -> ContentHash {
        *self.0.hash.get_or_init(|| {
            let parts = &self.0.parts;
            let mut h = ContentHasher::new();
            h.write_tag(b'T');
            parts.schema.hash_into(&mut h);
            parts.rows.hash_into(&mut h);
            h.write_u64(parts.conflicts.len() as u64);
            for entry in parts.conflicts.values() {
                hash_conflict(entry, &mut h);
            }
            h.write_u64(parts.violations.len() as u64);
            for v in parts.violations.values() {
                v.hash_into(&mut h);
            }
            h.write_u64(parts.auto_increment);
            h.finish()
        })
    }

    /// Hash of the schema alone.
    #[must_use]
    pub fn schema_hash(&self) -> ContentHash {
        let mut h = ContentHasher::new();
        self.schema().hash_into(&mut h);
        h.finish()
    }

    /// Returns `true` if both handles point at the same content.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.hash_of() == other.hash_of()
    }

    /// Builder: replace the rows, keeping everything else.
    #[must_use]
    pub fn with_rows(&self, rows: RowSet) -> Self {
        let mut parts = self.to_parts();
        parts.rows = rows;
        Self::from_parts(parts)
    }

    /// Builder: replace the violation partition.
    #[must_use]
    pub fn with_violations(
        &self,
        violations: BTreeMap<ViolationId, ConstraintViolation>,
    ) -> Self {
        let mut parts = self.to_parts();
        parts.violations = violations;
        Self::from_parts(parts)
    }

    /// Builder: replace the conflict partition.
    #[must_use]
    pub fn with_conflicts(&self, conflicts: BTreeMap<Tuple, ConflictEntry>) -> Self {
        let mut parts = self.to_parts();
        parts.conflicts = conflicts;
        Self::from_parts(parts)
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.same_content(other)
    }
}

impl Eq for Table {}

/// One past the largest non-negative integer in the auto-increment column,
/// or 0 when the schema has none.
#[must_use]
pub fn next_auto_increment(schema: &Schema, rows: &RowSet) -> u64 {
    let Some(col) = schema.auto_increment_column() else {
        return 0;
    };
    let Some(loc) = schema.locate(col.tag) else {
        return 0;
    };
    let max = rows
        .iter()
        .filter_map(|(k, v)| match loc {
            CellLocation::Key(i) => k.get(i),
            CellLocation::Value(i) => v.cells.get(i),
        })
        .filter_map(|v| match v {
            Value::Int(i) => u64::try_from(*i).ok(),
            Value::Uint(u) => Some(*u),
            _ => None,
        })
        .max();
    max.map_or(1, |m| m.saturating_add(1))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
