//! Serializable merge reports.
//!
//! [`MergeReport`] is the caller-facing summary of one merge attempt,
//! successful or not. [`MergeStatus`] collapses the outcome to three states
//! so callers can branch without inspecting counters.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use vtmerge_store::{ContentHash, TableName};

use crate::error::MergeError;
use crate::merge::MergeResult;
use crate::model::conflict::{SchemaConflict, TableConflictSummary, conflict_summaries};
use crate::model::stats::MergeStats;

/// Three-state summary of a merge attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStatus {
    /// Merged with nothing left to resolve.
    Clean,
    /// Merged; conflicts, skipped tables, or violations await the caller.
    CompletedWithConflicts,
    /// Failed; no root was produced.
    Aborted,
}

impl MergeStatus {
    /// Status of a merge outcome.
    #[must_use]
    pub fn of(result: &Result<MergeResult, MergeError>) -> Self {
        match result {
            Ok(r) if r.has_conflicts() => Self::CompletedWithConflicts,
            Ok(_) => Self::Clean,
            Err(_) => Self::Aborted,
        }
    }
}

impl fmt::Display for MergeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => write!(f, "clean"),
            Self::CompletedWithConflicts => write!(f, "completed with conflicts"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// How the merged root was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOutcome {
    /// Nothing to merge.
    UpToDate,
    /// Took the other side's root.
    FastForward,
    /// Full three-way merge.
    Merged,
}

/// Summary of one merge attempt.
#[derive(Clone, Debug, Serialize)]
pub struct MergeReport {
    /// Three-state status.
    pub status: MergeStatus,
    /// How the root was obtained; absent when the merge aborted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<MergeOutcome>,
    /// Hash of the merged root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<ContentHash>,
    /// Merge base, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<ContentHash>,
    /// Parents for the commit recording this merge.
    pub parents: Vec<ContentHash>,
    /// Per-table stats.
    pub tables: BTreeMap<TableName, MergeStats>,
    /// Tables carrying row conflicts or violations after the merge.
    pub conflicts: Vec<TableConflictSummary>,
    /// Schema conflicts on skipped tables.
    pub schema_conflicts: Vec<SchemaConflict>,
    /// Tables with constraint violations.
    pub violating_tables: Vec<TableName>,
    /// Error message for aborted merges.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MergeReport {
    /// Build a report from a merge outcome.
    #[must_use]
    pub fn from_result(result: &Result<MergeResult, MergeError>) -> Self {
        let status = MergeStatus::of(result);
        match result {
            Ok(r) => Self {
                status,
                outcome: Some(if r.up_to_date {
                    MergeOutcome::UpToDate
                } else if r.fast_forwarded {
                    MergeOutcome::FastForward
                } else {
                    MergeOutcome::Merged
                }),
                root: Some(r.root.hash_of()),
                base: r.base,
                parents: r.commit_parents(),
                tables: r.stats.clone(),
                conflicts: conflict_summaries(&r.root),
                schema_conflicts: r.schema_conflicts.clone(),
                violating_tables: r.violating_tables.iter().cloned().collect(),
                error: None,
            },
            Err(e) => Self {
                status,
                outcome: None,
                root: None,
                base: None,
                parents: Vec::new(),
                tables: BTreeMap::new(),
                conflicts: Vec::new(),
                schema_conflicts: match e {
                    MergeError::SchemaConflict { conflicts, .. } => conflicts.clone(),
                    _ => Vec::new(),
                },
                violating_tables: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }
}

impl fmt::Display for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "status: {}", self.status)?;
        if let Some(err) = &self.error {
            return writeln!(f, "error: {err}");
        }
        if let Some(root) = &self.root {
            writeln!(f, "root: {}", root.short(12))?;
        }
        for (name, stats) in &self.tables {
            writeln!(f, "  {name}: {stats}")?;
        }
        for c in &self.schema_conflicts {
            writeln!(f, "  schema conflict: {c}")?;
        }
        for t in &self.violating_tables {
            writeln!(f, "  violations in {t}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtmerge_store::ContentHash;

    #[test]
    fn aborted_report_carries_the_error() {
        let err: Result<MergeResult, MergeError> = Err(MergeError::NoCommonHistory {
            left: ContentHash::ZERO,
            right: ContentHash::ZERO,
        });
        let report = MergeReport::from_result(&err);
        assert_eq!(report.status, MergeStatus::Aborted);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "aborted");
        assert!(json["error"].as_str().unwrap().contains("share no common history"));
        assert!(json.get("root").is_none());
    }
}
