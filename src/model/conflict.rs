//! Structured conflict model: schema conflicts and per-table summaries.
//!
//! Row-level conflicts ([`ConflictEntry`]) and constraint violations
//! ([`ConstraintViolation`]) are stored on the tables themselves and live in
//! `vtmerge-store`. This module adds the conflicts that stop a table's data
//! from being merged at all, and a per-table roll-up used by reporting.
//!
//! # Schema conflict kinds
//!
//! | Kind | Description |
//! |------|-------------|
//! | [`SchemaConflictKind::TableAddedOnBothSides`] | Same table created on both sides with different schemas |
//! | [`SchemaConflictKind::TableDeletedAndModified`] | One side dropped the table, the other changed it |
//! | [`SchemaConflictKind::PrimaryKeyChange`] | Either side changed the primary key definition |
//! | [`SchemaConflictKind::ColumnDefinition`] | Both sides changed one column differently |
//! | [`SchemaConflictKind::ColumnDropModify`] | One side dropped a column the other changed |
//! | [`SchemaConflictKind::ColumnNameCollision`] | Two different columns end up with the same name |
//! | [`SchemaConflictKind::Index`] | Index definitions cannot be reconciled |
//! | [`SchemaConflictKind::ForeignKey`] | Foreign-key definitions cannot be reconciled |
//!
//! # Serialization
//!
//! Kinds use tagged JSON (`{"kind": "column_definition", "tag": 3}`) so that
//! reports are machine-readable.
//!
//! [`ConflictEntry`]: vtmerge_store::ConflictEntry
//! [`ConstraintViolation`]: vtmerge_store::ConstraintViolation

use std::fmt;

use serde::Serialize;
use vtmerge_store::{ColumnTag, RootValue, TableName};

// ---------------------------------------------------------------------------
// SchemaConflictKind
// ---------------------------------------------------------------------------

/// What part of a table's definition could not be merged.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaConflictKind {
    /// The table was created on both sides with different schemas.
    TableAddedOnBothSides,
    /// One side dropped the table while the other modified it.
    TableDeletedAndModified,
    /// The primary key changed on at least one side, so rows cannot be
    /// matched key-for-key.
    PrimaryKeyChange,
    /// Both sides changed the same column's definition differently.
    ColumnDefinition {
        /// Column tag.
        tag: ColumnTag,
    },
    /// One side dropped a column the other side modified.
    ColumnDropModify {
        /// Column tag.
        tag: ColumnTag,
    },
    /// Distinct columns would share a (case-insensitive) name.
    ColumnNameCollision {
        /// The colliding name.
        name: String,
    },
    /// Index definitions cannot be reconciled.
    Index {
        /// Index name.
        name: String,
    },
    /// Foreign-key definitions cannot be reconciled.
    ForeignKey {
        /// Constraint name.
        name: String,
    },
}

impl SchemaConflictKind {
    /// Whether this conflict blocks the table but never the whole merge.
    ///
    /// Primary-key changes are warnings unless the caller asks for strict
    /// handling.
    #[must_use]
    pub const fn is_primary_key_change(&self) -> bool {
        matches!(self, Self::PrimaryKeyChange)
    }
}

impl fmt::Display for SchemaConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TableAddedOnBothSides => write!(f, "table added on both sides"),
            Self::TableDeletedAndModified => write!(f, "table deleted and modified"),
            Self::PrimaryKeyChange => write!(f, "primary key changed"),
            Self::ColumnDefinition { tag } => write!(f, "column {tag} changed on both sides"),
            Self::ColumnDropModify { tag } => write!(f, "column {tag} dropped and modified"),
            Self::ColumnNameCollision { name } => write!(f, "column name collision on '{name}'"),
            Self::Index { name } => write!(f, "index '{name}' conflicts"),
            Self::ForeignKey { name } => write!(f, "foreign key '{name}' conflicts"),
        }
    }
}

// ---------------------------------------------------------------------------
// SchemaConflict
// ---------------------------------------------------------------------------

/// A schema conflict on one table.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct SchemaConflict {
    /// The affected table.
    pub table: TableName,
    /// What could not be merged.
    #[serde(flatten)]
    pub kind: SchemaConflictKind,
    /// Human-readable detail (old/new definitions).
    pub detail: String,
}

impl SchemaConflict {
    /// Create a schema conflict.
    pub fn new(table: TableName, kind: SchemaConflictKind, detail: impl Into<String>) -> Self {
        Self {
            table,
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for SchemaConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.table, self.kind)?;
        if !self.detail.is_empty() {
            write!(f, " ({})", self.detail)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TableConflictSummary
// ---------------------------------------------------------------------------

/// Pending merge artifacts on one table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableConflictSummary {
    /// Table name.
    pub table: TableName,
    /// Unresolved row conflicts.
    pub data_conflicts: u64,
    /// Recorded constraint violations.
    pub constraint_violations: u64,
}

/// Summarize every table in `root` that carries conflicts or violations, in
/// table-name order.
#[must_use]
pub fn conflict_summaries(root: &RootValue) -> Vec<TableConflictSummary> {
    root.tables()
        .filter(|(_, t)| t.has_conflicts() || t.has_violations())
        .map(|(name, t)| TableConflictSummary {
            table: name.clone(),
            data_conflicts: t.conflicts().len() as u64,
            constraint_violations: t.violations().len() as u64,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn t(name: &str) -> TableName {
        TableName::new(name).unwrap()
    }

    #[test]
    fn schema_conflict_serializes_flat_and_tagged() {
        let c =
            SchemaConflict::new(t("people"), SchemaConflictKind::ColumnDefinition { tag: 3 }, "");
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["table"], "people");
        assert_eq!(json["kind"], "column_definition");
        assert_eq!(json["tag"], 3);
    }

    #[test]
    fn display_includes_detail() {
        let c = SchemaConflict::new(
            t("orders"),
            SchemaConflictKind::PrimaryKeyChange,
            "ours (id) vs theirs (id, region)",
        );
        assert_eq!(
            c.to_string(),
            "orders: primary key changed (ours (id) vs theirs (id, region))"
        );
        assert!(c.kind.is_primary_key_change());
    }

    #[test]
    fn summaries_skip_clean_tables() {
        assert!(conflict_summaries(&RootValue::empty()).is_empty());
    }
}
