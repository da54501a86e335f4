//! Row sets: ordered maps from key tuples to value tuples.
//!
//! A keyed table stores each row as `(primary-key tuple, non-key tuple)`. A
//! keyless table has no natural key, so each distinct row is keyed by the
//! content hash of its cells and carries a cardinality (how many identical
//! copies exist). Both shapes share [`RowSet`], whose `BTreeMap` backing gives
//! the total key order every merge walk depends on.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;

use serde::Serialize;

use crate::error::StoreError;
use crate::hash::{ContentHash, ContentHasher};
use crate::schema::Schema;
use crate::value::Value;

// ---------------------------------------------------------------------------
// Tuple
// ---------------------------------------------------------------------------

/// An ordered list of cell values.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Tuple(pub Vec<Value>);

impl Tuple {
    /// Create a tuple from values.
    #[must_use]
    pub const fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// The cell values.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for the zero-width tuple.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Cell at `i`, if in range.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<&Value> {
        self.0.get(i)
    }

    /// Feed the canonical encoding into a hasher.
    pub fn hash_into(&self, h: &mut ContentHasher) {
        h.write_u64(self.0.len() as u64);
        for v in &self.0 {
            v.hash_into(h);
        }
    }

    /// Content hash of this tuple alone.
    #[must_use]
    pub fn content_hash(&self) -> ContentHash {
        let mut h = ContentHasher::new();
        self.hash_into(&mut h);
        h.finish()
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v}")?;
        }
        f.write_str(")")
    }
}

impl From<Vec<Value>> for Tuple {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

/// The synthetic key of a keyless row: a one-cell tuple holding the content
/// hash of the row's cells.
#[must_use]
pub fn keyless_key(cells: &Tuple) -> Tuple {
    Tuple(vec![Value::Blob(cells.content_hash().as_bytes().to_vec())])
}

// ---------------------------------------------------------------------------
// RowValue
// ---------------------------------------------------------------------------

/// The stored half of a row: non-key cells plus a duplicate count.
///
/// `cardinality` is always 1 for keyed tables.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct RowValue {
    /// Non-key cells in value-column order (all cells for keyless tables).
    pub cells: Tuple,
    /// Number of identical copies (keyless tables only; 1 otherwise).
    pub cardinality: u64,
}

impl RowValue {
    /// A single-copy row.
    #[must_use]
    pub const fn new(cells: Tuple) -> Self {
        Self {
            cells,
            cardinality: 1,
        }
    }

    /// A keyless row with an explicit copy count.
    #[must_use]
    pub const fn with_cardinality(cells: Tuple, cardinality: u64) -> Self {
        Self { cells, cardinality }
    }

    fn hash_into(&self, h: &mut ContentHasher) {
        self.cells.hash_into(h);
        h.write_u64(self.cardinality);
    }
}

// ---------------------------------------------------------------------------
// RowSet
// ---------------------------------------------------------------------------

/// A table's rows in key order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RowSet(BTreeMap<Tuple, RowValue>);

impl RowSet {
    /// An empty row set.
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build a row set from full rows (every column, in schema column order).
    ///
    /// For keyed schemas each row is split into its key and value tuples. For
    /// keyless schemas identical rows collapse into one entry whose
    /// cardinality counts the copies.
    ///
    /// # Errors
    /// Returns [`StoreError::InvalidRow`] if a row has the wrong width, a
    /// cell does not fit its column type, a `NOT NULL` column holds `NULL`,
    /// or two rows share a primary key.
    pub fn from_full_rows(
        schema: &Schema,
        rows: impl IntoIterator<Item = Vec<Value>>,
    ) -> Result<Self, StoreError> {
        let mut set = Self::new();
        for row in rows {
            check_row(schema, &row)?;
            let (key, cells) = split_row(schema, row);
            if schema.is_keyless() {
                set.0
                    .entry(key)
                    .and_modify(|v| v.cardinality += 1)
                    .or_insert_with(|| RowValue::new(cells));
            } else {
                if set.0.contains_key(&key) {
                    return Err(StoreError::InvalidRow {
                        message: format!("duplicate primary key {key}"),
                    });
                }
                set.0.insert(key, RowValue::new(cells));
            }
        }
        Ok(set)
    }

    /// Look up a row by key.
    #[must_use]
    pub fn get(&self, key: &Tuple) -> Option<&RowValue> {
        self.0.get(key)
    }

    /// Returns `true` if the key is present.
    #[must_use]
    pub fn contains(&self, key: &Tuple) -> bool {
        self.0.contains_key(key)
    }

    /// Insert or replace a row, returning the previous value.
    pub fn insert(&mut self, key: Tuple, value: RowValue) -> Option<RowValue> {
        self.0.insert(key, value)
    }

    /// Remove a row, returning it.
    pub fn remove(&mut self, key: &Tuple) -> Option<RowValue> {
        self.0.remove(key)
    }

    /// Iterate rows in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, Tuple, RowValue> {
        self.0.iter()
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total row count including keyless duplicates.
    #[must_use]
    pub fn row_count(&self) -> u64 {
        self.0.values().map(|v| v.cardinality).sum()
    }

    /// Feed the canonical encoding into a hasher.
    pub fn hash_into(&self, h: &mut ContentHasher) {
        h.write_u64(self.0.len() as u64);
        for (k, v) in &self.0 {
            k.hash_into(h);
            v.hash_into(h);
        }
    }
}

impl<'a> IntoIterator for &'a RowSet {
    type Item = (&'a Tuple, &'a RowValue);
    type IntoIter = btree_map::Iter<'a, Tuple, RowValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for RowSet {
    type Item = (Tuple, RowValue);
    type IntoIter = btree_map::IntoIter<Tuple, RowValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(Tuple, RowValue)> for RowSet {
    fn from_iter<I: IntoIterator<Item = (Tuple, RowValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Layout helpers
// ---------------------------------------------------------------------------

fn check_row(schema: &Schema, row: &[Value]) -> Result<(), StoreError> {
    let columns = schema.columns();
    if row.len() != columns.len() {
        return Err(StoreError::InvalidRow {
            message: format!("expected {} cells, got {}", columns.len(), row.len()),
        });
    }
    for (col, cell) in columns.iter().zip(row) {
        if !col.ty.accepts(cell) {
            return Err(StoreError::InvalidRow {
                message: format!(
                    "column '{}' of type {} cannot hold {} value {cell}",
                    col.name,
                    col.ty,
                    cell.type_name()
                ),
            });
        }
        if cell.is_null() && !col.nullable {
            return Err(StoreError::InvalidRow {
                message: format!("column '{}' is NOT NULL", col.name),
            });
        }
    }
    Ok(())
}

/// Split a full row (schema column order) into its stored key and value
/// tuples.
#[must_use]
pub fn split_row(schema: &Schema, row: Vec<Value>) -> (Tuple, Tuple) {
    if schema.is_keyless() {
        let cells = Tuple(row);
        return (keyless_key(&cells), cells);
    }
    let mut key = vec![Value::Null; schema.primary_key().len()];
    let mut values = Vec::with_capacity(row.len().saturating_sub(key.len()));
    for (col, cell) in schema.columns().iter().zip(row) {
        match schema.primary_key().iter().position(|t| *t == col.tag) {
            Some(pos) => key[pos] = cell,
            None => values.push(cell),
        }
    }
    (Tuple(key), Tuple(values))
}

/// Reassemble a full row (schema column order) from stored key and value
/// tuples. Missing cells come back as `NULL`.
#[must_use]
pub fn join_row(schema: &Schema, key: &Tuple, cells: &Tuple) -> Vec<Value> {
    if schema.is_keyless() {
        return cells.0.clone();
    }
    let mut values = cells.0.iter();
    schema
        .columns()
        .iter()
        .map(|col| {
            let cell = match schema.primary_key().iter().position(|t| *t == col.tag) {
                Some(pos) => key.get(pos),
                None => values.next(),
            };
            cell.cloned().unwrap_or(Value::Null)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
