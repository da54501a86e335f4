//! Root-level merge: every table, then foreign keys, then constraints.
//!
//! Tables are independent key spaces, so [`merge_roots`] merges them on a
//! scoped worker pool bounded by `MergeOptions::concurrency` and the table
//! count. Workers pull table indexes from a shared counter and return their
//! outcomes; nothing is published until every worker has joined, and a new
//! root is assembled only if no table failed. A failed merge therefore never
//! leaves a partial root behind.
//!
//! Cancellation is checked before each table is picked up. Tables already
//! in flight finish; no new ones start.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{info, instrument, warn};
use vtmerge_store::{RootValue, TableName, union_table_names};

use super::foreign_keys::{merge_foreign_keys, prune_foreign_keys};
use super::table::{TableMergeOutcome, merge_table};
use super::types::{MergeContext, MergeEvent, MergeOptions};
use crate::constraints::{VerifyMode, verify_constraints};
use crate::error::MergeError;
use crate::model::conflict::SchemaConflict;
use crate::model::stats::{MergeStats, TableOperation};

/// Everything [`merge_roots`] produces.
#[derive(Clone, Debug)]
pub struct RootsMerge {
    /// The merged root.
    pub root: RootValue,
    /// Per-table stats for every table present on any side.
    pub stats: BTreeMap<TableName, MergeStats>,
    /// Schema conflicts recorded for skipped tables.
    pub schema_conflicts: Vec<SchemaConflict>,
    /// Tables holding constraint violations after verification.
    pub violating_tables: BTreeSet<TableName>,
}

type TableResult = (usize, Result<TableMergeOutcome, MergeError>);

/// Merge `ours` and `theirs` against `base`, table by table.
///
/// # Errors
/// The first fatal table error in table-name order, [`MergeError::Cancelled`]
/// if cancellation stopped scheduling, or a constraint verification failure.
#[instrument(skip_all, fields(tables = tracing::field::Empty))]
pub fn merge_roots(
    base: &RootValue,
    ours: &RootValue,
    theirs: &RootValue,
    opts: &MergeOptions,
    ctx: &MergeContext,
) -> Result<RootsMerge, MergeError> {
    opts.validate()?;
    let names = union_table_names([base, ours, theirs]);
    tracing::Span::current().record("tables", names.len());

    let results = run_workers(&names, base, ours, theirs, opts, ctx);
    let mut slots: Vec<Option<Result<TableMergeOutcome, MergeError>>> =
        (0..names.len()).map(|_| None).collect();
    for (idx, result) in results {
        slots[idx] = Some(result);
    }

    let mut root = ours.clone();
    let mut stats = BTreeMap::new();
    let mut schema_conflicts = Vec::new();
    let mut touched = Vec::new();
    for (name, slot) in names.iter().zip(slots) {
        let outcome = slot.ok_or(MergeError::Cancelled)??;
        root = match outcome.table {
            Some(table) => root.put_table(name.clone(), table),
            None => root.remove_table(name),
        };
        if matches!(
            outcome.stats.operation,
            TableOperation::Modified | TableOperation::Added
        ) {
            touched.push(name.clone());
        }
        schema_conflicts.extend(outcome.schema_conflicts);
        stats.insert(name.clone(), outcome.stats);
    }

    let fks = merge_foreign_keys(base.foreign_keys(), ours.foreign_keys(), theirs.foreign_keys());
    let foreign_keys = if fks.conflicts.is_empty() {
        fks.foreign_keys
    } else if opts.keep_schema_conflicts {
        warn!(conflicts = fks.conflicts.len(), "foreign key conflicts; keeping our definitions");
        for c in &fks.conflicts {
            stats.entry(c.table.clone()).or_default().schema_conflicts += 1;
        }
        schema_conflicts.extend(fks.conflicts);
        ours.foreign_keys().to_vec()
    } else {
        let table = fks.conflicts[0].table.clone();
        let conflicts = fks
            .conflicts
            .into_iter()
            .filter(|c| c.table == table)
            .collect();
        return Err(MergeError::SchemaConflict { table, conflicts });
    };
    let root = root.with_foreign_keys(prune_foreign_keys(&root, foreign_keys));

    let mode = if opts.reverify_all_constraints {
        VerifyMode::Full
    } else {
        VerifyMode::Incremental
    };
    let to_verify = tables_to_verify(&root, &touched, mode);
    let verified = verify_constraints(&root, ours, &to_verify, mode)?;
    for (name, count) in &verified.counts {
        stats.entry(name.clone()).or_default().constraint_violations = *count;
    }

    info!(
        tables = stats.len(),
        schema_conflicts = schema_conflicts.len(),
        violating = verified.violating_tables.len(),
        "roots merged"
    );
    Ok(RootsMerge {
        root: verified.root,
        stats,
        schema_conflicts,
        violating_tables: verified.violating_tables,
    })
}

/// Touched tables plus the children of any foreign key whose parent was
/// touched. Full mode checks every table.
fn tables_to_verify(root: &RootValue, touched: &[TableName], mode: VerifyMode) -> Vec<TableName> {
    if mode == VerifyMode::Full {
        return root.table_names();
    }
    let mut out: BTreeSet<TableName> = touched.iter().cloned().collect();
    for fk in root.foreign_keys() {
        if touched.contains(&fk.parent_table) {
            out.insert(fk.child_table.clone());
        }
    }
    out.into_iter().filter(|n| root.has_table(n)).collect()
}

fn run_workers(
    names: &[TableName],
    base: &RootValue,
    ours: &RootValue,
    theirs: &RootValue,
    opts: &MergeOptions,
    ctx: &MergeContext,
) -> Vec<TableResult> {
    let next = AtomicUsize::new(0);
    let workers = opts.concurrency.min(names.len()).max(1);
    let worker = || {
        let mut done = Vec::new();
        loop {
            if ctx.is_cancelled() {
                break;
            }
            let idx = next.fetch_add(1, Ordering::Relaxed);
            let Some(name) = names.get(idx) else {
                break;
            };
            let result = merge_table(
                name,
                base.get_table(name),
                ours.get_table(name),
                theirs.get_table(name),
                opts,
            );
            if let Ok(outcome) = &result {
                let event = if outcome.stats.operation == TableOperation::Skipped {
                    MergeEvent::TableSkipped {
                        table: name.clone(),
                        reason: outcome
                            .schema_conflicts
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join("; "),
                    }
                } else {
                    MergeEvent::TableMerged {
                        table: name.clone(),
                        operation: outcome.stats.operation,
                    }
                };
                ctx.notify(&event);
            }
            done.push((idx, result));
        }
        done
    };

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..workers).map(|_| s.spawn(worker)).collect();
        handles
            .into_iter()
            .flat_map(|h| match h.join() {
                Ok(done) => done,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
