//! Import outcome tracking.
//!
//! Row-level failures are collected here rather than returned as errors, so a
//! single bad line never aborts an import unless strict mode is on.

use crate::error::{ImportError, ValidationError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Succeeded,
    Failed,
    Cancelled,
}

/// A row that was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFailure {
    pub line: u64,
    pub field: String,
    pub reason: String,
}

impl RowFailure {
    pub fn new(line: u64, error: &ValidationError) -> Self {
        Self {
            line,
            field: error.field.clone(),
            reason: error.reason.clone(),
        }
    }
}

/// Final state of one import.
#[derive(Debug)]
pub struct ImportResult {
    pub status: ImportStatus,
    /// Data rows pulled from the source, including rejected ones.
    pub rows_read: usize,
    /// Records committed to storage.
    pub rows_processed: usize,
    pub rows_rejected: usize,
    pub batches_written: usize,
    /// The first rejected rows, up to the configured cap.
    pub failures: Vec<RowFailure>,
    pub elapsed: Duration,
    pub error: Option<ImportError>,
}

impl ImportResult {
    pub(crate) fn new() -> Self {
        Self {
            status: ImportStatus::Succeeded,
            rows_read: 0,
            rows_processed: 0,
            rows_rejected: 0,
            batches_written: 0,
            failures: Vec::new(),
            elapsed: Duration::ZERO,
            error: None,
        }
    }

    /// A result for an import that failed before reading any rows.
    pub(crate) fn failed(error: ImportError, elapsed: Duration) -> Self {
        Self {
            status: ImportStatus::Failed,
            elapsed,
            error: Some(error),
            ..Self::new()
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ImportStatus::Succeeded
    }

    /// Serializable snapshot for callers that report over JSON.
    pub fn report(&self) -> ImportReport {
        ImportReport {
            status: self.status,
            rows_read: self.rows_read,
            rows_processed: self.rows_processed,
            rows_rejected: self.rows_rejected,
            batches_written: self.batches_written,
            failures: self.failures.clone(),
            elapsed_secs: self.elapsed.as_secs_f64(),
            error_kind: self.error.as_ref().map(|err| err.kind().to_string()),
            error: self.error.as_ref().map(|err| err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub status: ImportStatus,
    pub rows_read: usize,
    pub rows_processed: usize,
    pub rows_rejected: usize,
    pub batches_written: usize,
    pub failures: Vec<RowFailure>,
    pub elapsed_secs: f64,
    pub error_kind: Option<String>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;

    #[test]
    fn report_carries_error_kind_and_message() {
        let result = ImportResult::failed(
            ImportError::Source(SourceError::MissingHeader),
            Duration::from_millis(1500),
        );
        let report = result.report();
        assert_eq!(report.status, ImportStatus::Failed);
        assert_eq!(report.error_kind.as_deref(), Some("SourceError"));
        assert_eq!(
            report.error.as_deref(),
            Some("source error: source has no header row")
        );
        assert!((report.elapsed_secs - 1.5).abs() < f64::EPSILON);

        let json = serde_json::to_value(&report).expect("serializes");
        assert_eq!(json["status"], "failed");
    }
}
