//! Import orchestration.
//!
//! The pipeline runs in two stages connected by a bounded channel:
//!
//! 1. **Producer** (blocking thread) - reads CSV rows and transforms them into
//!    customer records, one row at a time.
//! 2. **Consumer** (async task) - batches records and hands each full batch to
//!    the [`BulkWriter`], awaiting it before taking the next row.
//!
//! The channel bound gives backpressure: once it is full the producer blocks
//! instead of buffering the file in memory. Records reach the writer in file
//! order and there is never more than one write in flight.
//!
//! # Failure policy
//!
//! - Invalid rows are recorded and skipped, or abort the import in strict mode.
//! - A storage error stops the import at once. Earlier batches stay committed.
//! - A source error (unreadable file, missing header, I/O failure) fails the import.
//! - Cancellation stops reading at the next row boundary. Buffered records that
//!   were not yet written are discarded.

use crate::config::ImportConfig;
use crate::error::{ImportError, SourceError, StorageError, ValidationError};
use crate::import::accumulator::{Batch, BatchAccumulator};
use crate::import::reader::{ReadError, RecordReader};
use crate::import::stats::{ImportResult, ImportStatus, RowFailure};
use crate::import::transformer::transform;
use crate::import::writer::BulkWriter;
use crate::models::{CUSTOMER_COLUMNS, CustomerRecord};
use std::io::Read;
use std::path::Path;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Field name reported for records the CSV reader could not decode.
pub const MALFORMED_RECORD_FIELD: &str = "record";

/// Rejected rows logged individually before switching to a summary.
const MAX_LOGGED_REJECTIONS: usize = 5;

/// What the producer sends for each source row.
#[derive(Debug)]
enum RowOutcome {
    Record(CustomerRecord),
    Rejected { line: u64, error: ValidationError },
    Fatal(SourceError),
}

/// Read → transform → batch → write.
pub struct ImportPipeline<W> {
    config: ImportConfig,
    writer: W,
}

impl<W: BulkWriter> ImportPipeline<W> {
    pub fn new(config: ImportConfig, writer: W) -> Self {
        Self { config, writer }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Import a CSV file.
    ///
    /// Never returns an error directly; failures are reported through
    /// [`ImportResult::status`] and [`ImportResult::error`].
    pub async fn run(&mut self, source: impl AsRef<Path>, cancel: CancellationToken) -> ImportResult {
        let started = Instant::now();

        if let Err(err) = self.config.validate() {
            return finish(ImportResult::failed(err.into(), started.elapsed()));
        }

        let source = source.as_ref();
        log::debug!("opening import source {}", source.display());
        let reader = match RecordReader::open(source) {
            Ok(reader) => reader,
            Err(err) => return finish(ImportResult::failed(err.into(), started.elapsed())),
        };

        self.import(reader, cancel, started).await
    }

    /// Import from an already opened reader.
    pub async fn run_reader<R>(
        &mut self,
        reader: RecordReader<R>,
        cancel: CancellationToken,
    ) -> ImportResult
    where
        R: Read + Send + 'static,
    {
        let started = Instant::now();

        if let Err(err) = self.config.validate() {
            return finish(ImportResult::failed(err.into(), started.elapsed()));
        }

        self.import(reader, cancel, started).await
    }

    async fn import<R>(
        &mut self,
        reader: RecordReader<R>,
        cancel: CancellationToken,
        started: Instant,
    ) -> ImportResult
    where
        R: Read + Send + 'static,
    {
        let missing = reader.missing_columns(&CUSTOMER_COLUMNS);
        if !missing.is_empty() {
            log::warn!(
                "source header is missing columns {:?}; rows will be rejected",
                missing
            );
        }

        let (tx, mut rx) = mpsc::channel(self.config.channel_capacity);
        let producer_cancel = cancel.clone();
        let producer = tokio::task::spawn_blocking(move || produce(reader, tx, producer_cancel));

        let mut result = ImportResult::new();
        let mut accumulator = BatchAccumulator::new(self.config.batch_size);

        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    result.status = ImportStatus::Cancelled;
                    break;
                }
                outcome = rx.recv() => outcome,
            };

            let Some(outcome) = outcome else {
                break;
            };

            match outcome {
                RowOutcome::Record(record) => {
                    result.rows_read += 1;
                    if let Some(batch) = accumulator.push(record) {
                        if let Err(err) = self.write_batch(batch, &mut result).await {
                            fail(&mut result, err.into());
                            break;
                        }
                    }
                }
                RowOutcome::Rejected { line, error } => {
                    result.rows_read += 1;
                    self.reject(&mut result, line, &error);
                    if self.config.strict {
                        fail(&mut result, ImportError::Validation { line, error });
                        break;
                    }
                }
                RowOutcome::Fatal(err) => {
                    fail(&mut result, err.into());
                    break;
                }
            }
        }

        // Closing the receiver unblocks a producer waiting on a full channel.
        drop(rx);
        if let Err(err) = producer.await {
            if result.status == ImportStatus::Succeeded {
                fail(&mut result, ImportError::Worker(err.to_string()));
            }
        }

        if result.status == ImportStatus::Succeeded && cancel.is_cancelled() {
            result.status = ImportStatus::Cancelled;
        }

        if result.status == ImportStatus::Succeeded {
            log::debug!("source exhausted, flushing {} buffered records", accumulator.pending());
            if let Some(batch) = accumulator.flush() {
                if let Err(err) = self.write_batch(batch, &mut result).await {
                    fail(&mut result, err.into());
                }
            }
        } else if accumulator.pending() > 0 {
            log::debug!(
                "discarding {} buffered records that were not written",
                accumulator.pending()
            );
        }

        if result.rows_rejected > MAX_LOGGED_REJECTIONS {
            log::warn!(
                "{} rows rejected in total ({} logged individually)",
                result.rows_rejected,
                MAX_LOGGED_REJECTIONS
            );
        }

        result.elapsed = started.elapsed();
        finish(result)
    }

    async fn write_batch(
        &mut self,
        batch: Batch,
        result: &mut ImportResult,
    ) -> Result<(), StorageError> {
        let sequence = batch.sequence;
        let size = batch.len();

        let written = self.writer.write(batch).await.map_err(|err| {
            log::error!("batch {} ({} records) failed: {}", sequence, size, err);
            err
        })?;

        result.rows_processed += written.rows_written;
        result.batches_written += 1;
        log::trace!(
            "batch {}: wrote {} records ({} total)",
            sequence,
            written.rows_written,
            result.rows_processed
        );
        Ok(())
    }

    fn reject(&self, result: &mut ImportResult, line: u64, error: &ValidationError) {
        result.rows_rejected += 1;
        if result.rows_rejected <= MAX_LOGGED_REJECTIONS {
            log::warn!("line {}: row skipped, {}", line, error);
        }
        if result.failures.len() < self.config.max_recorded_failures {
            result.failures.push(RowFailure::new(line, error));
        }
    }
}

fn fail(result: &mut ImportResult, error: ImportError) {
    result.status = ImportStatus::Failed;
    result.error = Some(error);
}

/// Emit the single completion log line and hand the result back.
fn finish(result: ImportResult) -> ImportResult {
    let secs = result.elapsed.as_secs_f64();
    match (&result.status, &result.error) {
        (ImportStatus::Succeeded, _) => log::info!(
            "customer import succeeded in {:.3}s: {} rows processed, {} rejected, {} batches",
            secs,
            result.rows_processed,
            result.rows_rejected,
            result.batches_written
        ),
        (ImportStatus::Cancelled, _) => log::warn!(
            "customer import cancelled after {:.3}s: {} rows processed in {} batches",
            secs,
            result.rows_processed,
            result.batches_written
        ),
        (ImportStatus::Failed, error) => log::error!(
            "customer import failed after {:.3}s: {} rows processed in {} batches: {}",
            secs,
            result.rows_processed,
            result.batches_written,
            error
                .as_ref()
                .map(|err| err.to_string())
                .unwrap_or_else(|| "unknown error".to_string())
        ),
    }
    result
}

/// Producer stage: runs on a blocking thread until the source is exhausted,
/// the import is cancelled, or the consumer hangs up.
fn produce<R: Read>(
    reader: RecordReader<R>,
    tx: mpsc::Sender<RowOutcome>,
    cancel: CancellationToken,
) {
    for item in reader {
        if cancel.is_cancelled() {
            log::debug!("import cancelled, producer stopping");
            break;
        }

        let outcome = match item {
            Ok(row) => match transform(&row) {
                Ok(record) => RowOutcome::Record(record),
                Err(error) => RowOutcome::Rejected {
                    line: row.line(),
                    error,
                },
            },
            Err(ReadError::Malformed { line, reason }) => RowOutcome::Rejected {
                line,
                error: ValidationError::new(MALFORMED_RECORD_FIELD, reason),
            },
            Err(ReadError::Source(err)) => RowOutcome::Fatal(err),
        };

        let fatal = matches!(outcome, RowOutcome::Fatal(_));
        if tx.blocking_send(outcome).is_err() {
            log::debug!("import consumer stopped, producer stopping");
            break;
        }
        if fatal {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingWriter, customer_csv};

    fn pipeline(batch_size: usize) -> ImportPipeline<RecordingWriter> {
        ImportPipeline::new(
            ImportConfig::default()
                .with_batch_size(batch_size)
                .with_channel_capacity(4),
            RecordingWriter::new(),
        )
    }

    fn reader(csv: String) -> RecordReader<std::io::Cursor<Vec<u8>>> {
        RecordReader::from_reader(std::io::Cursor::new(csv.into_bytes())).expect("header parses")
    }

    #[tokio::test]
    async fn small_import_flushes_remainder() {
        let mut pipeline = pipeline(3);
        let result = pipeline
            .run_reader(reader(customer_csv(7)), CancellationToken::new())
            .await;

        assert_eq!(result.status, ImportStatus::Succeeded);
        assert_eq!(result.rows_read, 7);
        assert_eq!(result.rows_processed, 7);
        assert_eq!(result.batches_written, 3);
        assert_eq!(pipeline.writer().batch_sizes(), vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn records_arrive_in_file_order() {
        let mut pipeline = pipeline(2);
        pipeline
            .run_reader(reader(customer_csv(5)), CancellationToken::new())
            .await;

        let ids: Vec<String> = pipeline
            .writer()
            .records()
            .map(|record| record.customer_id.clone())
            .collect();
        let expected: Vec<String> = (0..5).map(|n| format!("CUST{n:06}")).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn invalid_config_fails_before_reading() {
        let mut pipeline = ImportPipeline::new(
            ImportConfig::default().with_batch_size(0),
            RecordingWriter::new(),
        );
        let result = pipeline
            .run_reader(reader(customer_csv(3)), CancellationToken::new())
            .await;

        assert_eq!(result.status, ImportStatus::Failed);
        assert!(matches!(result.error, Some(ImportError::Config(_))));
        assert_eq!(result.rows_read, 0);
        assert!(pipeline.writer().batch_sizes().is_empty());
    }

    #[tokio::test]
    async fn cancelled_before_start_writes_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut pipeline = pipeline(2);
        let result = pipeline.run_reader(reader(customer_csv(10)), cancel).await;

        assert_eq!(result.status, ImportStatus::Cancelled);
        assert_eq!(result.rows_processed, 0);
        assert!(result.error.is_none());
        assert!(pipeline.writer().batch_sizes().is_empty());
    }

    #[tokio::test]
    async fn failure_list_is_capped() {
        let mut csv = customer_csv(0);
        for n in 0..10 {
            csv.push_str(&format!(
                "BAD{n},A,B,C,D,E,1,2,bad{n}@example.com,99-99-2023,http://x\n"
            ));
        }

        let mut config = ImportConfig::default().with_batch_size(5);
        config.max_recorded_failures = 3;
        let mut pipeline = ImportPipeline::new(config, RecordingWriter::new());
        let result = pipeline
            .run_reader(reader(csv), CancellationToken::new())
            .await;

        assert_eq!(result.status, ImportStatus::Succeeded);
        assert_eq!(result.rows_rejected, 10);
        assert_eq!(result.failures.len(), 3);
        assert_eq!(result.failures[0].line, 2);
        assert_eq!(result.failures[0].field, "Subscription Date");
    }
}
