//! Root values: immutable snapshots of every table at one commit.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};

use crate::hash::{ContentHash, ContentHasher};
use crate::schema::{ForeignKey, TableName};
use crate::table::Table;

#[derive(Debug, Default)]
struct RootInner {
    tables: BTreeMap<TableName, Table>,
    foreign_keys: Vec<ForeignKey>,
    hash: OnceLock<ContentHash>,
}

/// An immutable mapping from table name to [`Table`], plus the root-level
/// foreign-key collection.
///
/// Updates return a new root; the receiver is never mutated.
#[derive(Clone, Debug, Default)]
pub struct RootValue(Arc<RootInner>);

impl RootValue {
    /// A root with no tables.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a root from tables and foreign keys.
    #[must_use]
    pub fn new(tables: BTreeMap<TableName, Table>, foreign_keys: Vec<ForeignKey>) -> Self {
        Self(Arc::new(RootInner {
            tables,
            foreign_keys,
            hash: OnceLock::new(),
        }))
    }

    /// Look up a table by name.
    #[must_use]
    pub fn get_table(&self, name: &TableName) -> Option<&Table> {
        self.0.tables.get(name)
    }

    /// Returns `true` if the table exists.
    #[must_use]
    pub fn has_table(&self, name: &TableName) -> bool {
        self.0.tables.contains_key(name)
    }

    /// All table names in sorted order.
    #[must_use]
    pub fn table_names(&self) -> Vec<TableName> {
        self.0.tables.keys().cloned().collect()
    }

    /// Iterate `(name, table)` in name order.
    pub fn tables(&self) -> impl Iterator<Item = (&TableName, &Table)> + '_ {
        self.0.tables.iter()
    }

    /// Root-level foreign keys.
    #[must_use]
    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.0.foreign_keys
    }

    /// Foreign keys whose child is `table`.
    pub fn foreign_keys_of<'a>(
        &'a self,
        table: &'a TableName,
    ) -> impl Iterator<Item = &'a ForeignKey> + 'a {
        self.0
            .foreign_keys
            .iter()
            .filter(move |fk| &fk.child_table == table)
    }

    /// A new root with `name` set to `table`.
    #[must_use]
    pub fn put_table(&self, name: TableName, table: Table) -> Self {
        let mut tables = self.0.tables.clone();
        tables.insert(name, table);
        Self::new(tables, self.0.foreign_keys.clone())
    }

    /// A new root without `name`.
    #[must_use]
    pub fn remove_table(&self, name: &TableName) -> Self {
        let mut tables = self.0.tables.clone();
        tables.remove(name);
        Self::new(tables, self.0.foreign_keys.clone())
    }

    /// A new root with the foreign-key collection replaced.
    #[must_use]
    pub fn with_foreign_keys(&self, foreign_keys: Vec<ForeignKey>) -> Self {
        Self::new(self.0.tables.clone(), foreign_keys)
    }

    /// Content hash of a single table, if present.
    #[must_use]
    pub fn table_hash(&self, name: &TableName) -> Option<ContentHash> {
        self.0.tables.get(name).map(Table::hash_of)
    }

    /// Hash of every table, in name order.
    #[must_use]
    pub fn table_hashes(&self) -> BTreeMap<TableName, ContentHash> {
        self.0
            .tables
            .iter()
            .map(|(n, t)| (n.clone(), t.hash_of()))
            .collect()
    }

    /// Names of tables with pending row conflicts.
    #[must_use]
    pub fn tables_in_conflict(&self) -> Vec<TableName> {
        self.0
            .tables
            .iter()
            .filter(|(_, t)| t.has_conflicts())
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// Names of tables with recorded constraint violations.
    #[must_use]
    pub fn tables_with_violations(&self) -> Vec<TableName> {
        self.0
            .tables
            .iter()
            .filter(|(_, t)| t.has_violations())
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// Content hash of the whole root.
    pub fn hash_of(&self) -> ContentHash {
        *self.0.hash.get_or_init(|| {
            let mut h = ContentHasher::new();
            h.write_tag(b'R');
            h.write_u64(self.0.tables.len() as u64);
            for (name, table) in &self.0.tables {
                h.write_str(name.as_str());
                h.write_hash(&table.hash_of());
            }
            h.write_u64(self.0.foreign_keys.len() as u64);
            for fk in &self.0.foreign_keys {
                fk.hash_into(&mut h);
            }
            h.finish()
        })
    }
}

impl PartialEq for RootValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.hash_of() == other.hash_of()
    }
}

impl Eq for RootValue {}

/// Sorted union of the table names of several roots.
#[must_use]
pub fn union_table_names<'a>(roots: impl IntoIterator<Item = &'a RootValue>) -> Vec<TableName> {
    let mut names = BTreeSet::new();
    for root in roots {
        names.extend(root.0.tables.keys().cloned());
    }
    names.into_iter().collect()
}
