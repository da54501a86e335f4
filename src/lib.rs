//! vtmerge: three-way merge for versioned relational tables.
//!
//! Given two commits of a versioned table store, [`merge::merge`] finds their
//! merge base, merges every table's schema and rows, and returns a new root
//! plus per-table statistics. Row conflicts and constraint violations are
//! written into the merged tables as data; only genuinely unmergeable
//! situations (no common history, strict-mode schema conflicts) are errors.
//!
//! Storage objects and the commit graph come from `vtmerge-store`; this crate
//! never persists anything.
//!
//! # Modules
//!
//! - [`merge`]: merge base, schema merge, row differ, orchestration.
//! - [`resolve`]: pick a side for pending row conflicts.
//! - [`constraints`]: post-merge unique and foreign-key verification.
//! - [`model`]: schema conflicts, stats, and reports.
//! - [`config`], [`telemetry`], [`error`]: ambient plumbing.

pub mod config;
pub mod constraints;
pub mod error;
pub mod merge;
pub mod model;
pub mod resolve;
pub mod telemetry;

pub use constraints::{ConstraintError, VerifyMode, verify_constraints};
pub use error::MergeError;
pub use merge::{
    MergeContext, MergeOptions, MergeResult, Side, is_ancestor, merge, merge_base, merge_refs,
    merge_roots, merge_would_stomp_changes,
};
pub use model::report::{MergeReport, MergeStatus};
pub use model::stats::{MergeStats, TableOperation};
pub use resolve::{ResolveError, resolve_conflicts};
