//! Merge artifacts stored alongside a table's rows.
//!
//! A merge that "completes with conflicts" leaves two kinds of records on the
//! tables it produced:
//!
//! - [`ConflictEntry`]: a key whose two sides changed it incompatibly. The
//!   entry holds all three versions so a later resolution can pick one.
//! - [`ConstraintViolation`]: a row that breaks a foreign-key or unique
//!   constraint in the merged state.
//!
//! Both are data, not errors. They live in the table's conflict and
//! violation partitions until resolved or cleared.

use std::fmt;

use serde::Serialize;

use crate::hash::{ContentHash, ContentHasher};
use crate::row::{RowValue, Tuple};
use crate::schema::ColumnTag;

// ---------------------------------------------------------------------------
// ConflictEntry
// ---------------------------------------------------------------------------

/// How a row-level conflict arose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowConflictKind {
    /// Both sides inserted the same key with different values.
    AddAdd,
    /// Both sides modified overlapping columns differently.
    ModifyModify,
    /// Ours deleted the row, theirs modified it.
    DeletedByOurs,
    /// Theirs deleted the row, ours modified it.
    DeletedByTheirs,
    /// Both sides changed the same keyless row.
    Keyless,
}

impl fmt::Display for RowConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AddAdd => "add/add",
            Self::ModifyModify => "modify/modify",
            Self::DeletedByOurs => "delete/modify",
            Self::DeletedByTheirs => "modify/delete",
            Self::Keyless => "keyless",
        };
        f.write_str(s)
    }
}

/// One unresolved row conflict.
///
/// Values are stored in the merged table's row layout. A `None` side means
/// the row was absent on that side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConflictEntry {
    /// Row key (primary key tuple, or content-hash key for keyless rows).
    pub key: Tuple,
    /// Value in the merge base.
    pub base: Option<RowValue>,
    /// Value on our side.
    pub ours: Option<RowValue>,
    /// Value on their side.
    pub theirs: Option<RowValue>,
    /// Conflict classification.
    pub kind: RowConflictKind,
    /// Column tags changed incompatibly by both sides. Empty when the
    /// conflict is row-level (delete/modify, keyless).
    pub columns: Vec<ColumnTag>,
}

impl ConflictEntry {
    /// Stable identity of this conflict: the hash of its key.
    #[must_use]
    pub fn identity(&self) -> ContentHash {
        self.key.content_hash()
    }
}

// ---------------------------------------------------------------------------
// ConstraintViolation
// ---------------------------------------------------------------------------

/// Which kind of constraint a row breaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// A foreign key references a missing parent row.
    ForeignKey,
    /// A unique index holds a duplicate value.
    UniqueIndex,
    /// A NOT NULL column holds `NULL`.
    NotNull,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForeignKey => f.write_str("foreign key"),
            Self::UniqueIndex => f.write_str("unique index"),
            Self::NotNull => f.write_str("not null"),
        }
    }
}

/// Identity of a violation within a table: the same row can break several
/// constraints, each recorded once.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ViolationId {
    /// Violation kind.
    pub kind: ViolationKind,
    /// Constraint (FK or index) name.
    pub constraint: String,
    /// Key of the violating row.
    pub key: Tuple,
}

/// A row that violates a constraint in the merged state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConstraintViolation {
    /// Violation kind.
    pub kind: ViolationKind,
    /// Constraint (FK or index) name.
    pub constraint: String,
    /// Key of the violating row.
    pub key: Tuple,
    /// The violating row's stored value.
    pub row: RowValue,
    /// Structured details (columns, referenced table, ...).
    pub info: serde_json::Value,
}

impl ConstraintViolation {
    /// This violation's identity.
    #[must_use]
    pub fn id(&self) -> ViolationId {
        ViolationId {
            kind: self.kind,
            constraint: self.constraint.clone(),
            key: self.key.clone(),
        }
    }

    pub(crate) fn hash_into(&self, h: &mut ContentHasher) {
        h.write_tag(self.kind as u8);
        h.write_str(&self.constraint);
        self.key.hash_into(h);
        h.write_str(&self.info.to_string());
    }
}

pub(crate) fn hash_conflict(entry: &ConflictEntry, h: &mut ContentHasher) {
    entry.key.hash_into(h);
    for side in [&entry.base, &entry.ours, &entry.theirs] {
        match side {
            Some(v) => {
                h.write_tag(1);
                v.cells.hash_into(h);
                h.write_u64(v.cardinality);
            }
            None => h.write_tag(0),
        }
    }
    h.write_tag(entry.kind as u8);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn identity_depends_only_on_key() {
        let key = Tuple::new(vec![Value::Int(1)]);
        let a = ConflictEntry {
            key: key.clone(),
            base: None,
            ours: Some(RowValue::new(Tuple::new(vec![Value::Int(2)]))),
            theirs: Some(RowValue::new(Tuple::new(vec![Value::Int(3)]))),
            kind: RowConflictKind::AddAdd,
            columns: vec![2],
        };
        let mut b = a.clone();
        b.theirs = None;
        b.kind = RowConflictKind::DeletedByTheirs;
        assert_eq!(a.identity(), b.identity());
        assert_eq!(a.identity(), key.content_hash());
    }

    #[test]
    fn violation_kinds_render_as_snake_case() {
        let json = serde_json::to_string(&ViolationKind::UniqueIndex).unwrap();
        assert_eq!(json, "\"unique_index\"");
        assert_eq!(ViolationKind::NotNull.to_string(), "not null");
        assert_eq!(RowConflictKind::DeletedByOurs.to_string(), "delete/modify");
    }
}
