//! Table schemas: columns, primary keys, secondary indexes, foreign keys.
//!
//! Columns are identified by a stable numeric [`ColumnTag`] that survives
//! renames and reordering. Everything that compares schemas across commits
//! (schema merge, row remapping, index and foreign-key matching) goes through
//! tags, never through names or ordinal positions.

use std::fmt;

use serde::Serialize;

use crate::error::StoreError;
use crate::hash::ContentHasher;
use crate::value::{ColumnType, Value};

/// Stable column identifier.
pub type ColumnTag = u64;

// ---------------------------------------------------------------------------
// TableName
// ---------------------------------------------------------------------------

/// A schema-qualified table name (`"orders"` or `"sales.orders"`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TableName(String);

impl TableName {
    /// Create a table name.
    ///
    /// # Errors
    /// Returns [`StoreError::InvalidSchema`] for an empty name.
    pub fn new(name: &str) -> Result<Self, StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::InvalidSchema {
                message: "table name must not be empty".to_owned(),
            });
        }
        Ok(Self(name.to_owned()))
    }

    /// Return the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Column
// ---------------------------------------------------------------------------

/// A single column definition.
///
/// Key membership is not a column attribute; it lives in
/// [`Schema::primary_key`] so that key order is independent of column order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Column {
    /// Stable identifier.
    pub tag: ColumnTag,
    /// Display name (may change across commits without changing identity).
    pub name: String,
    /// Declared storage type.
    #[serde(rename = "type")]
    pub ty: ColumnType,
    /// Whether `NULL` is allowed.
    pub nullable: bool,
    /// Default value used for rows that predate the column.
    pub default: Option<Value>,
    /// Generated-column expression, stored verbatim.
    pub generated: Option<String>,
    /// Whether this column draws from the table's auto-increment counter.
    pub auto_increment: bool,
}

impl Column {
    /// A nullable column with no default.
    pub fn new(tag: ColumnTag, name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            tag,
            name: name.into(),
            ty,
            nullable: true,
            default: None,
            generated: None,
            auto_increment: false,
        }
    }

    /// Builder: mark as `NOT NULL`.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Builder: set a default value.
    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Builder: set a generated expression.
    #[must_use]
    pub fn generated_as(mut self, expr: impl Into<String>) -> Self {
        self.generated = Some(expr.into());
        self
    }

    /// Builder: mark as auto-increment.
    #[must_use]
    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// The value a row gets for this column when it has none: the default,
    /// or `NULL`.
    #[must_use]
    pub fn fill_value(&self) -> Value {
        self.default.clone().unwrap_or(Value::Null)
    }

    fn hash_into(&self, h: &mut ContentHasher) {
        h.write_u64(self.tag);
        h.write_str(&self.name);
        self.ty.hash_into(h);
        h.write_tag(u8::from(self.nullable));
        match &self.default {
            Some(v) => {
                h.write_tag(1);
                v.hash_into(h);
            }
            None => h.write_tag(0),
        }
        h.write_str(self.generated.as_deref().unwrap_or(""));
        h.write_tag(u8::from(self.auto_increment));
    }
}

// ---------------------------------------------------------------------------
// IndexDef
// ---------------------------------------------------------------------------

/// A secondary index over an ordered list of column tags.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IndexDef {
    /// Index name (unique per table, case-insensitive).
    pub name: String,
    /// Indexed columns, in index order.
    pub tags: Vec<ColumnTag>,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
}

impl IndexDef {
    /// Create an index definition.
    pub fn new(name: impl Into<String>, tags: Vec<ColumnTag>, unique: bool) -> Self {
        Self {
            name: name.into(),
            tags,
            unique,
        }
    }

    /// Two indexes cover the same columns in the same order.
    #[must_use]
    pub fn same_columns(&self, other: &Self) -> bool {
        self.tags == other.tags
    }
}

// ---------------------------------------------------------------------------
// ForeignKey
// ---------------------------------------------------------------------------

/// A foreign key from `child_table(child_tags)` to
/// `parent_table(parent_tags)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    /// Constraint name (case-insensitive identity for collision checks).
    pub name: String,
    /// Referencing table.
    pub child_table: TableName,
    /// Referencing columns.
    pub child_tags: Vec<ColumnTag>,
    /// Referenced table.
    pub parent_table: TableName,
    /// Referenced columns, positionally matched with `child_tags`.
    pub parent_tags: Vec<ColumnTag>,
}

impl ForeignKey {
    /// Two foreign keys constrain the same column pairs.
    #[must_use]
    pub fn same_columns(&self, other: &Self) -> bool {
        self.child_table == other.child_table
            && self.parent_table == other.parent_table
            && self.child_tags == other.child_tags
            && self.parent_tags == other.parent_tags
    }

    /// Feed the canonical encoding into a hasher.
    pub fn hash_into(&self, h: &mut ContentHasher) {
        h.write_str(&self.name);
        h.write_str(self.child_table.as_str());
        h.write_u64(self.child_tags.len() as u64);
        for t in &self.child_tags {
            h.write_u64(*t);
        }
        h.write_str(self.parent_table.as_str());
        h.write_u64(self.parent_tags.len() as u64);
        for t in &self.parent_tags {
            h.write_u64(*t);
        }
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// An ordered column list plus primary key and index definitions.
///
/// Row layout follows from the schema: a row's key tuple holds the primary
/// key columns in [`Schema::primary_key`] order, and its value tuple holds
/// every other column in column order. A schema with an empty primary key is
/// keyless: all columns are value columns and rows are identified by content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Schema {
    columns: Vec<Column>,
    primary_key: Vec<ColumnTag>,
    indexes: Vec<IndexDef>,
}

impl Schema {
    /// Build and validate a schema.
    ///
    /// # Errors
    /// Returns [`StoreError::InvalidSchema`] if tags or names collide, a key
    /// column is unknown or nullable, or an index references an unknown
    /// column or reuses a name.
    pub fn new(
        columns: Vec<Column>,
        primary_key: Vec<ColumnTag>,
        indexes: Vec<IndexDef>,
    ) -> Result<Self, StoreError> {
        let schema = Self {
            columns,
            primary_key,
            indexes,
        };
        schema.validate()?;
        Ok(schema)
    }

    fn validate(&self) -> Result<(), StoreError> {
        let invalid = |message: String| Err(StoreError::InvalidSchema { message });
        for (i, col) in self.columns.iter().enumerate() {
            for other in &self.columns[i + 1..] {
                if col.tag == other.tag {
                    return invalid(format!("duplicate column tag {}", col.tag));
                }
                if col.name.eq_ignore_ascii_case(&other.name) {
                    return invalid(format!("duplicate column name '{}'", col.name));
                }
            }
        }
        for (i, tag) in self.primary_key.iter().enumerate() {
            let Some(col) = self.column(*tag) else {
                return invalid(format!("primary key references unknown tag {tag}"));
            };
            if col.nullable {
                return invalid(format!("primary key column '{}' must be NOT NULL", col.name));
            }
            if self.primary_key[i + 1..].contains(tag) {
                return invalid(format!("primary key lists tag {tag} twice"));
            }
        }
        for (i, idx) in self.indexes.iter().enumerate() {
            if idx.tags.is_empty() {
                return invalid(format!("index '{}' has no columns", idx.name));
            }
            if let Some(tag) = idx.tags.iter().find(|t| self.column(**t).is_none()) {
                return invalid(format!("index '{}' references unknown tag {tag}", idx.name));
            }
            if self.indexes[i + 1..]
                .iter()
                .any(|o| o.name.eq_ignore_ascii_case(&idx.name))
            {
                return invalid(format!("duplicate index name '{}'", idx.name));
            }
        }
        Ok(())
    }

    /// All columns in declared order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Primary-key tags in key order. Empty for keyless tables.
    #[must_use]
    pub fn primary_key(&self) -> &[ColumnTag] {
        &self.primary_key
    }

    /// Secondary indexes.
    #[must_use]
    pub fn indexes(&self) -> &[IndexDef] {
        &self.indexes
    }

    /// Look up a column by tag.
    #[must_use]
    pub fn column(&self, tag: ColumnTag) -> Option<&Column> {
        self.columns.iter().find(|c| c.tag == tag)
    }

    /// Look up a column by case-insensitive name.
    #[must_use]
    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Look up an index by case-insensitive name.
    #[must_use]
    pub fn index_by_name(&self, name: &str) -> Option<&IndexDef> {
        self.indexes
            .iter()
            .find(|i| i.name.eq_ignore_ascii_case(name))
    }

    /// Returns `true` if the table has no primary key.
    #[must_use]
    pub fn is_keyless(&self) -> bool {
        self.primary_key.is_empty()
    }

    /// Returns `true` if `tag` is part of the primary key.
    #[must_use]
    pub fn is_key_column(&self, tag: ColumnTag) -> bool {
        self.primary_key.contains(&tag)
    }

    /// Non-key columns in column order (the value-tuple layout).
    pub fn value_columns(&self) -> impl Iterator<Item = &Column> + '_ {
        self.columns
            .iter()
            .filter(move |c| !self.primary_key.contains(&c.tag))
    }

    /// Key columns in key order (the key-tuple layout).
    pub fn key_columns(&self) -> impl Iterator<Item = &Column> + '_ {
        self.primary_key.iter().filter_map(move |t| self.column(*t))
    }

    /// Where a column lives in a row: in the key tuple or the value tuple,
    /// and at which position.
    #[must_use]
    pub fn locate(&self, tag: ColumnTag) -> Option<CellLocation> {
        if let Some(pos) = self.primary_key.iter().position(|t| *t == tag) {
            return Some(CellLocation::Key(pos));
        }
        self.value_columns()
            .position(|c| c.tag == tag)
            .map(CellLocation::Value)
    }

    /// The column carrying the auto-increment counter, if any.
    #[must_use]
    pub fn auto_increment_column(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.auto_increment)
    }

    /// Feed the canonical encoding into a hasher.
    pub fn hash_into(&self, h: &mut ContentHasher) {
        h.write_u64(self.columns.len() as u64);
        for col in &self.columns {
            col.hash_into(h);
        }
        h.write_u64(self.primary_key.len() as u64);
        for tag in &self.primary_key {
            h.write_u64(*tag);
        }
        h.write_u64(self.indexes.len() as u64);
        for idx in &self.indexes {
            h.write_str(&idx.name);
            h.write_tag(u8::from(idx.unique));
            h.write_u64(idx.tags.len() as u64);
            for t in &idx.tags {
                h.write_u64(*t);
            }
        }
    }
}

/// Position of a column inside a stored row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellLocation {
    /// Index into the key tuple.
    Key(usize),
    /// Index into the value tuple.
    Value(usize),
}

/// Whether rows of two schemas can be diffed key-for-key: both must have the
/// same primary-key tags, in the same order, with the same types.
#[must_use]
pub fn primary_key_sets_diffable(a: &Schema, b: &Schema) -> bool {
    if a.primary_key != b.primary_key {
        return false;
    }
    a.key_columns()
        .zip(b.key_columns())
        .all(|(x, y)| x.ty == y.ty)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
