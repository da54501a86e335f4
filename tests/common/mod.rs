//! Shared builders for vtmerge integration tests.
//!
//! Everything is in memory: each test builds a [`Repo`] (a [`MemoryGraph`]
//! plus helpers) and commits hand-written tables to it.

#![allow(dead_code)]

use std::collections::BTreeMap;

use vtmerge::merge::{MergeContext, MergeOptions, MergeResult, merge};
use vtmerge::MergeError;
use vtmerge_store::{
    Column, ColumnType, Commit, CommitMeta, ForeignKey, IndexDef, MemoryGraph, RootValue, RowSet,
    Schema, Table, TableName, Tuple, Value,
};

pub fn name(s: &str) -> TableName {
    TableName::new(s).expect("valid table name")
}

pub fn key(id: i64) -> Tuple {
    Tuple::new(vec![Value::Int(id)])
}

/// `t(id PK, a, b)`, all ints.
pub fn abc_schema() -> Schema {
    Schema::new(
        vec![
            Column::new(1, "id", ColumnType::Int).not_null(),
            Column::new(2, "a", ColumnType::Int),
            Column::new(3, "b", ColumnType::Int),
        ],
        vec![1],
        vec![],
    )
    .expect("valid schema")
}

/// `parent(id PK)`.
pub fn parent_schema() -> Schema {
    Schema::new(
        vec![Column::new(10, "id", ColumnType::Int).not_null()],
        vec![10],
        vec![],
    )
    .expect("valid schema")
}

/// `child(id PK, parent_id)` with a unique index on `parent_id`.
pub fn child_schema() -> Schema {
    Schema::new(
        vec![
            Column::new(20, "id", ColumnType::Int).not_null(),
            Column::new(21, "parent_id", ColumnType::Int),
        ],
        vec![20],
        vec![IndexDef::new("uniq_parent", vec![21], true)],
    )
    .expect("valid schema")
}

pub fn child_fk() -> ForeignKey {
    ForeignKey {
        name: "fk_child_parent".to_owned(),
        child_table: name("child"),
        child_tags: vec![21],
        parent_table: name("parent"),
        parent_tags: vec![10],
    }
}

/// Build a table from integer rows in schema column order.
pub fn table(schema: &Schema, rows: &[&[i64]]) -> Table {
    let rows = rows
        .iter()
        .map(|r| r.iter().copied().map(Value::Int).collect::<Vec<_>>());
    Table::new(
        schema.clone(),
        RowSet::from_full_rows(schema, rows).expect("valid rows"),
    )
}

pub fn root(tables: Vec<(&str, Table)>) -> RootValue {
    root_with_fks(tables, vec![])
}

pub fn root_with_fks(tables: Vec<(&str, Table)>, fks: Vec<ForeignKey>) -> RootValue {
    let tables: BTreeMap<_, _> = tables.into_iter().map(|(n, t)| (name(n), t)).collect();
    RootValue::new(tables, fks)
}

/// Integer cells of one stored row, key first.
pub fn row_of(t: &Table, id: i64) -> Option<Vec<i64>> {
    t.full_row(&key(id)).map(|cells| {
        cells
            .into_iter()
            .map(|v| match v {
                Value::Int(i) => i,
                other => panic!("unexpected cell {other:?}"),
            })
            .collect()
    })
}

// ---------------------------------------------------------------------------
// Repo
// ---------------------------------------------------------------------------

/// An in-memory repository with a commit counter for unique messages.
#[derive(Default)]
pub struct Repo {
    pub graph: MemoryGraph,
    seq: usize,
}

impl Repo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commit(&mut self, parents: &[&Commit], root: RootValue) -> Commit {
        self.seq += 1;
        let hashes: Vec<_> = parents.iter().map(|p| p.hash()).collect();
        self.graph
            .commit_with(&hashes, CommitMeta::message(format!("commit {}", self.seq)), root)
            .expect("commit")
    }

    /// Commit `base`, then `ours` and `theirs` on top of it.
    pub fn diverge(
        &mut self,
        base: RootValue,
        ours: RootValue,
        theirs: RootValue,
    ) -> (Commit, Commit, Commit) {
        let b = self.commit(&[], base);
        let o = self.commit(&[&b], ours);
        let t = self.commit(&[&b], theirs);
        (b, o, t)
    }

    pub fn merge(
        &self,
        left: &Commit,
        right: &Commit,
        opts: &MergeOptions,
    ) -> Result<MergeResult, MergeError> {
        merge(&self.graph, left, right, opts, &MergeContext::new())
    }
}
