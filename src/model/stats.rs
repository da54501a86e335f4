//! Per-table merge statistics.

use std::fmt;

use serde::Serialize;

/// What the merge did to a table as a whole.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableOperation {
    /// Result equals our side.
    #[default]
    Unmodified,
    /// Rows or schema changed relative to our side.
    Modified,
    /// Table did not exist on our side and was taken from theirs.
    Added,
    /// Table was dropped.
    Removed,
    /// Data merge was skipped because of a schema conflict; our side kept.
    Skipped,
}

impl fmt::Display for TableOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unmodified => "unmodified",
            Self::Modified => "modified",
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Row counters for one table, measured against our side's pre-merge
/// contents.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    /// Table-level outcome.
    pub operation: TableOperation,
    /// Rows added.
    pub adds: u64,
    /// Rows whose stored value changed.
    pub modifications: u64,
    /// Rows removed.
    pub deletes: u64,
    /// Row conflicts recorded.
    pub data_conflicts: u64,
    /// Schema conflicts recorded.
    pub schema_conflicts: u64,
    /// Constraint violations recorded by post-merge verification.
    pub constraint_violations: u64,
}

impl MergeStats {
    /// Stats for a table the merge did not touch.
    #[must_use]
    pub fn unmodified() -> Self {
        Self::default()
    }

    /// Stats with a given operation and no counters.
    #[must_use]
    pub fn with_operation(operation: TableOperation) -> Self {
        Self {
            operation,
            ..Self::default()
        }
    }

    /// Returns `true` if anything needs the caller's attention.
    #[must_use]
    pub const fn has_conflicts(&self) -> bool {
        self.data_conflicts > 0 || self.schema_conflicts > 0 || self.constraint_violations > 0
    }

    /// Total rows that changed on our side.
    #[must_use]
    pub const fn rows_changed(&self) -> u64 {
        self.adds + self.modifications + self.deletes
    }
}

impl fmt::Display for MergeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: +{} ~{} -{}",
            self.operation, self.adds, self.modifications, self.deletes
        )?;
        if self.has_conflicts() {
            write!(
                f,
                " ({} data conflicts, {} schema conflicts, {} violations)",
                self.data_conflicts, self.schema_conflicts, self.constraint_violations
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_conflicts_only_when_present() {
        let mut s = MergeStats::with_operation(TableOperation::Modified);
        s.adds = 2;
        s.deletes = 1;
        assert_eq!(s.to_string(), "modified: +2 ~0 -1");
        s.data_conflicts = 1;
        assert!(s.to_string().ends_with("(1 data conflicts, 0 schema conflicts, 0 violations)"));
        assert_eq!(s.rows_changed(), 3);
    }
}
