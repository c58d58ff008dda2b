//! Fixed-size batching of customer records.

use crate::models::CustomerRecord;

/// An ordered group of records committed with one bulk insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Zero-based position of this batch within its import.
    pub sequence: usize,
    pub records: Vec<CustomerRecord>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Buffers records and hands them out in batches of `batch_size`.
///
/// Every batch except possibly the one returned by [`flush`](Self::flush) has
/// exactly `batch_size` records, in arrival order.
#[derive(Debug)]
pub struct BatchAccumulator {
    batch_size: usize,
    buffer: Vec<CustomerRecord>,
    next_sequence: usize,
}

impl BatchAccumulator {
    /// A `batch_size` of zero is treated as one.
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            buffer: Vec::with_capacity(batch_size),
            next_sequence: 0,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Records currently buffered and not yet handed out.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Append a record, returning a full batch once `batch_size` is reached.
    pub fn push(&mut self, record: CustomerRecord) -> Option<Batch> {
        self.buffer.push(record);
        if self.buffer.len() >= self.batch_size {
            Some(self.take())
        } else {
            None
        }
    }

    /// Hand out whatever is buffered, if anything.
    pub fn flush(&mut self) -> Option<Batch> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    fn take(&mut self) -> Batch {
        let records = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.batch_size));
        let batch = Batch {
            sequence: self.next_sequence,
            records,
        };
        self.next_sequence += 1;
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(n: usize) -> CustomerRecord {
        CustomerRecord {
            customer_id: format!("c{n}"),
            first_name: String::new(),
            last_name: String::new(),
            company: String::new(),
            city: String::new(),
            country: String::new(),
            phone1: String::new(),
            phone2: String::new(),
            email: format!("c{n}@example.com"),
            subscription_date: NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
            website: String::new(),
        }
    }

    fn drain(total: usize, batch_size: usize) -> Vec<Batch> {
        let mut acc = BatchAccumulator::new(batch_size);
        let mut batches: Vec<Batch> = (0..total).filter_map(|n| acc.push(record(n))).collect();
        batches.extend(acc.flush());
        batches
    }

    #[test]
    fn yields_full_batches_then_remainder() {
        let batches = drain(12_001, 5_000);
        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![5_000, 5_000, 2_001]);
        let sequences: Vec<usize> = batches.iter().map(|b| b.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[test]
    fn no_record_is_lost_or_duplicated() {
        for (total, size) in [(0, 3), (1, 3), (3, 3), (7, 3), (10, 1), (9, 10)] {
            let batches = drain(total, size);
            let ids: Vec<String> = batches
                .iter()
                .flat_map(|b| b.records.iter().map(|r| r.customer_id.clone()))
                .collect();
            let expected: Vec<String> = (0..total).map(|n| format!("c{n}")).collect();
            assert_eq!(ids, expected, "total={total} size={size}");

            if let Some((last, rest)) = batches.split_last() {
                assert!(rest.iter().all(|b| b.len() == size));
                assert!((1..=size).contains(&last.len()));
            }
        }
    }

    #[test]
    fn exact_multiple_leaves_nothing_to_flush() {
        let mut acc = BatchAccumulator::new(2);
        assert!(acc.push(record(0)).is_none());
        assert_eq!(acc.pending(), 1);
        assert!(acc.push(record(1)).is_some());
        assert_eq!(acc.pending(), 0);
        assert!(acc.flush().is_none());
    }

    #[test]
    fn flush_resets_state() {
        let mut acc = BatchAccumulator::new(5);
        acc.push(record(0));
        let batch = acc.flush().expect("one record buffered");
        assert_eq!(batch.len(), 1);
        assert!(acc.flush().is_none());

        acc.push(record(1));
        let next = acc.flush().expect("buffer reused");
        assert_eq!(next.sequence, 1);
        assert_eq!(next.records[0].customer_id, "c1");
    }

    #[test]
    fn zero_batch_size_behaves_as_one() {
        let mut acc = BatchAccumulator::new(0);
        assert_eq!(acc.batch_size(), 1);
        assert!(acc.push(record(0)).is_some());
    }
}
