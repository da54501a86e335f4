//! Storage boundary for vtmerge.
//!
//! This crate defines the immutable, content-addressed objects the merge
//! core reads and produces, and the [`CommitGraph`] trait through which it
//! reads history. The merge core never touches persistence; everything it
//! needs from storage goes through the types re-exported here.
//!
//! # Crate layout
//!
//! - [`hash`]: [`ContentHash`] and the canonical [`ContentHasher`].
//! - [`value`]: typed cell values ([`Value`], [`ColumnType`], [`Decimal`]).
//! - [`schema`]: [`Schema`], [`Column`], [`IndexDef`], [`ForeignKey`].
//! - [`row`]: [`Tuple`], [`RowValue`], [`RowSet`].
//! - [`artifacts`]: conflict and constraint-violation records.
//! - [`table`], [`root`], [`commit`]: the snapshot hierarchy.
//! - [`graph`]: the [`CommitGraph`] trait and [`CommitClosure`].
//! - [`memory`]: an in-memory graph; [`fixture`]: a JSON loader for it.
//! - [`error`]: the [`StoreError`] enum returned throughout.

pub mod artifacts;
pub mod commit;
pub mod error;
pub mod fixture;
pub mod graph;
pub mod hash;
pub mod memory;
pub mod root;
pub mod row;
pub mod schema;
pub mod table;
pub mod value;

pub use artifacts::{
    ConflictEntry, ConstraintViolation, RowConflictKind, ViolationId, ViolationKind,
};
pub use commit::{Commit, CommitMeta};
pub use error::StoreError;
pub use fixture::{load_fixture, parse_fixture};
pub use graph::{CommitClosure, CommitGraph};
pub use hash::{ContentHash, ContentHasher};
pub use memory::MemoryGraph;
pub use root::{RootValue, union_table_names};
pub use row::{RowSet, RowValue, Tuple, join_row, keyless_key, split_row};
pub use schema::{
    CellLocation, Column, ColumnTag, ForeignKey, IndexDef, Schema, TableName,
    primary_key_sets_diffable,
};
pub use table::{RowState, Table, TableParts, next_auto_increment};
pub use value::{ColumnType, Decimal, Value};
