//! Streaming CSV reader.
//!
//! Wraps `csv::Reader` to produce one [`RawRow`] per data record without
//! loading the file into memory. Values are handed out exactly as they appear
//! between delimiters; no trimming or type conversion happens here.
//!
//! Rows shorter than the header are not rejected by the reader. Their
//! trailing columns are simply absent, which the transformer reports as a
//! validation error for the first missing column.

use crate::error::SourceError;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

const UTF8_BOM: char = '\u{feff}';

/// Failure while pulling the next row from a source.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The record could not be decoded. The reader can continue past it.
    #[error("malformed record on line {line}: {reason}")]
    Malformed { line: u64, reason: String },
    /// The underlying source failed. No further rows will be produced.
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Column names from the header row, shared by every row of one source.
#[derive(Debug)]
struct Header {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl Header {
    fn from_record(record: &StringRecord) -> Self {
        let names: Vec<String> = record
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                if idx == 0 {
                    name.trim_start_matches(UTF8_BOM).to_string()
                } else {
                    name.to_string()
                }
            })
            .collect();

        // Duplicate column names resolve to the first occurrence
        let mut positions = HashMap::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            positions.entry(name.clone()).or_insert(idx);
        }

        Self { names, positions }
    }
}

/// One data record keyed by header column name.
#[derive(Debug, Clone)]
pub struct RawRow {
    line: u64,
    header: Arc<Header>,
    values: StringRecord,
}

impl RawRow {
    /// Raw value for `column`, or `None` when the header has no such column or
    /// the record ends before it.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.header
            .positions
            .get(column)
            .and_then(|&idx| self.values.get(idx))
    }

    /// 1-based line in the source where this record starts.
    pub fn line(&self) -> u64 {
        self.line
    }

}

/// Lazy, forward-only sequence of rows from a CSV source.
pub struct RecordReader<R> {
    reader: csv::Reader<R>,
    header: Arc<Header>,
    record: StringRecord,
    finished: bool,
}

impl RecordReader<File> {
    /// Open a CSV file and consume its header row.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }
}

impl<R: Read> RecordReader<R> {
    /// Wrap any byte source and consume its header row.
    pub fn from_reader(source: R) -> Result<Self, SourceError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::None)
            .from_reader(source);

        let header_record = reader.headers().map_err(SourceError::Header)?;
        if header_record.iter().all(|name| name.is_empty()) {
            return Err(SourceError::MissingHeader);
        }
        let header = Arc::new(Header::from_record(header_record));

        Ok(Self {
            reader,
            header,
            record: StringRecord::new(),
            finished: false,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.header.names
    }

    /// Columns from `required` that the header does not contain.
    pub fn missing_columns<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|column| !self.header.positions.contains_key(*column))
            .collect()
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<RawRow, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.reader.read_record(&mut self.record) {
            Ok(true) => {
                let line = self.record.position().map(|pos| pos.line()).unwrap_or(0);
                Some(Ok(RawRow {
                    line,
                    header: Arc::clone(&self.header),
                    values: self.record.clone(),
                }))
            }
            Ok(false) => {
                self.finished = true;
                None
            }
            Err(err) => {
                let line = err
                    .position()
                    .map(|pos| pos.line())
                    .unwrap_or_else(|| self.reader.position().line());

                if matches!(err.kind(), csv::ErrorKind::Io(_)) {
                    self.finished = true;
                    Some(Err(ReadError::Source(SourceError::Read { line, source: err })))
                } else {
                    Some(Err(ReadError::Malformed {
                        line,
                        reason: err.to_string(),
                    }))
                }
            }
        }
    }
}
