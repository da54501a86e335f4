//! Error types for storage operations.
//!
//! [`StoreError`] is the single error type returned by the
//! [`CommitGraph`](crate::CommitGraph) trait and by the constructors of the
//! value types in this crate. Variants are specific enough that callers can
//! match on the failure mode (missing commit, malformed hash, bad schema)
//! without parsing messages.

use thiserror::Error;

/// Errors returned by storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A requested commit, ref, or table was not found.
    #[error("not found: {message}")]
    NotFound {
        /// Human-readable description of what was missing.
        message: String,
    },

    /// A content hash string could not be parsed.
    #[error("invalid hash `{value}`: {reason}")]
    InvalidHash {
        /// The raw value that failed validation.
        value: String,
        /// Why validation failed.
        reason: String,
    },

    /// A schema definition is internally inconsistent (duplicate tags,
    /// nullable key columns, indexes over unknown columns, ...).
    #[error("invalid schema: {message}")]
    InvalidSchema {
        /// What is wrong with the schema.
        message: String,
    },

    /// A row does not fit the schema it is being stored under.
    #[error("invalid row: {message}")]
    InvalidRow {
        /// What is wrong with the row.
        message: String,
    },

    /// A fixture document is structurally valid JSON but describes an
    /// impossible repository (unknown parent, duplicate commit id, ...).
    #[error("invalid fixture: {message}")]
    InvalidFixture {
        /// What is wrong with the fixture.
        message: String,
    },

    /// An I/O error occurred while reading a fixture.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A fixture could not be parsed as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Shorthand for a [`StoreError::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a [`StoreError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
