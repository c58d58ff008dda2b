//! Error taxonomy for customer imports.
//!
//! Row-level problems ([`ValidationError`]) are recoverable and aggregated into
//! the import result. Source, storage and configuration problems are fatal and
//! surface through [`ImportError`].

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The CSV source could not be opened or read.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open source {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("source has no header row")]
    MissingHeader,
    #[error("failed to read header row: {0}")]
    Header(#[source] csv::Error),
    #[error("failed to read source near line {line}: {source}")]
    Read {
        line: u64,
        #[source]
        source: csv::Error,
    },
}

/// A single row could not be turned into a customer record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid `{field}`: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// The column was not present in the row at all.
    pub fn missing_column(field: &str) -> Self {
        Self::new(field, "column is absent from the row")
    }
}

/// A batch was rejected by the store. None of its records are considered written.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("batch {batch} rejected: {message}")]
    Rejected { batch: usize, message: String },
}

/// Invalid import or database configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    MissingVar(&'static str),
    #[error("batch size must be at least 1")]
    ZeroBatchSize,
    #[error("channel capacity must be at least 1")]
    ZeroChannelCapacity,
    #[error("invalid table name `{0}`")]
    InvalidTable(String),
}

/// Failure that terminated an import.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),
    #[error("validation error on line {line}: {error}")]
    Validation {
        line: u64,
        #[source]
        error: ValidationError,
    },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("import worker failed: {0}")]
    Worker(String),
}

impl ImportError {
    /// Short machine-readable tag, used in serialized reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ImportError::Source(_) => "SourceError",
            ImportError::Validation { .. } => "ValidationError",
            ImportError::Storage(_) => "StorageError",
            ImportError::Config(_) => "ConfigError",
            ImportError::Worker(_) => "WorkerError",
        }
    }
}
