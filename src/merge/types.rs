//! Core types shared by the merge pipeline: options, context, and sides.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use vtmerge_store::TableName;

use crate::config::MergeConfig;
use crate::error::MergeError;
use crate::model::stats::TableOperation;

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// One side of a three-way merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The branch being merged into (left).
    Ours,
    /// The branch being merged in (right).
    Theirs,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ours => write!(f, "ours"),
            Self::Theirs => write!(f, "theirs"),
        }
    }
}

// ---------------------------------------------------------------------------
// MergeOptions
// ---------------------------------------------------------------------------

/// Caller-supplied merge behaviour.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeOptions {
    /// Produce a result whose eventual commit has only our side as parent.
    pub squash: bool,
    /// Never fast-forward; always run a full merge.
    pub no_ff: bool,
    /// Record schema conflicts and skip those tables instead of aborting.
    pub keep_schema_conflicts: bool,
    /// Abort on primary-key changes instead of skipping the table.
    pub strict_primary_keys: bool,
    /// Check every row against every constraint after the merge.
    pub reverify_all_constraints: bool,
    /// Upper bound on tables merged in parallel.
    pub concurrency: usize,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self::from(&MergeConfig::default())
    }
}

impl From<&MergeConfig> for MergeOptions {
    fn from(cfg: &MergeConfig) -> Self {
        Self {
            squash: false,
            no_ff: false,
            keep_schema_conflicts: cfg.keep_schema_conflicts,
            strict_primary_keys: cfg.strict_primary_keys,
            reverify_all_constraints: cfg.reverify_all_constraints,
            concurrency: cfg.concurrency,
        }
    }
}

impl MergeOptions {
    /// Reject contradictory combinations.
    ///
    /// # Errors
    /// [`MergeError::IncompatibleOptions`] for `squash` with `no_ff`, or a
    /// zero concurrency bound.
    pub fn validate(&self) -> Result<(), MergeError> {
        if self.squash && self.no_ff {
            return Err(MergeError::IncompatibleOptions {
                message: "squash and no_ff cannot be combined".to_owned(),
            });
        }
        if self.concurrency == 0 {
            return Err(MergeError::IncompatibleOptions {
                message: "concurrency must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MergeContext
// ---------------------------------------------------------------------------

/// Progress notifications delivered to a [`MergeContext`] observer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeEvent {
    /// A table finished merging.
    TableMerged {
        /// The table.
        table: TableName,
        /// What happened to it.
        operation: TableOperation,
    },
    /// A table was skipped because of a schema conflict.
    TableSkipped {
        /// The table.
        table: TableName,
        /// Why.
        reason: String,
    },
}

/// Observer callback type.
pub type MergeObserver = Arc<dyn Fn(&MergeEvent) + Send + Sync>;

/// Explicit per-invocation hooks: cancellation and progress observation.
///
/// No session or ambient state is threaded through the merge; everything the
/// merge reads comes from its arguments.
#[derive(Clone, Default)]
pub struct MergeContext {
    cancel: Option<Arc<AtomicBool>>,
    observer: Option<MergeObserver>,
}

impl fmt::Debug for MergeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeContext")
            .field("cancellable", &self.cancel.is_some())
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

impl MergeContext {
    /// A context with no hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: attach a cancellation flag. Setting it stops the merge
    /// before the next table is scheduled.
    #[must_use]
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Builder: attach a progress observer.
    #[must_use]
    pub fn with_observer(mut self, observer: MergeObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Returns `true` once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Deliver an event to the observer, if any.
    pub fn notify(&self, event: &MergeEvent) {
        if let Some(observer) = &self.observer {
            observer(event);
        }
    }
}
