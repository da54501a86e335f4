//! Merge result data model: schema conflicts, stats, and reports.

pub mod conflict;
pub mod report;
pub mod stats;
