//! Bulk customer import system.
//!
//! This module provides the pipeline for loading a customer CSV export into
//! the database:
//!
//! 1. **Reading** (`reader`) - Streams CSV rows keyed by header column
//! 2. **Transformation** (`transformer`) - Validates rows into `CustomerRecord`s
//! 3. **Batching** (`accumulator`) - Groups records into fixed-size batches
//! 4. **Database Operations** (`writer`) - Bulk inserts using PostgreSQL UNNEST
//! 5. **Coordination** (`pipeline`) - Runs the stages and tracks the outcome
//! 6. **Statistics** (`stats`) - Counts, row failures and timing
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use customer_import::config::ImportConfig;
//! use customer_import::import::{ImportPipeline, PgBulkWriter};
//! use tokio_util::sync::CancellationToken;
//!
//! let writer = PgBulkWriter::new(pool, "customers")?;
//! let mut pipeline = ImportPipeline::new(ImportConfig::default(), writer);
//! let result = pipeline.run("customers.csv", CancellationToken::new()).await;
//!
//! println!("imported {} customers", result.rows_processed);
//! ```

pub mod accumulator;
pub mod pipeline;
pub mod reader;
pub mod stats;
pub mod transformer;
pub mod writer;

// Re-export main types
pub use accumulator::{Batch, BatchAccumulator};
pub use pipeline::ImportPipeline;
pub use reader::{RawRow, ReadError, RecordReader};
pub use stats::{ImportReport, ImportResult, ImportStatus, RowFailure};
pub use transformer::transform;
pub use writer::{BulkWriter, PgBulkWriter, WriteResult};
