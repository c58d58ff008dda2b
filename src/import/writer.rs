//! Bulk database insert of customer batches.
//!
//! Each batch is written with a single `INSERT ... SELECT FROM UNNEST(...)`
//! statement. One statement means one implicit transaction, so a rejected batch
//! leaves no rows behind. Writes are not idempotent: re-sending a batch
//! duplicates it unless the table enforces a unique key.

use crate::config::{DatabaseConfig, is_valid_table_name};
use crate::error::{ConfigError, StorageError};
use crate::import::accumulator::Batch;
use crate::models::CustomerRecord;
use chrono::NaiveDate;
use sqlx::PgPool;
use std::future::Future;

/// Outcome of one successful batch write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteResult {
    pub rows_written: usize,
}

/// Destination for completed batches.
///
/// The pipeline awaits each call before issuing the next one, so
/// implementations never see concurrent writes from the same import.
pub trait BulkWriter: Send {
    fn write(
        &mut self,
        batch: Batch,
    ) -> impl Future<Output = Result<WriteResult, StorageError>> + Send;
}

/// Prepared customer data in columnar format.
///
/// All vectors have the same length; index `i` across them is one record.
#[derive(Debug, Default)]
pub struct CustomersData {
    pub customer_ids: Vec<String>,
    pub first_names: Vec<String>,
    pub last_names: Vec<String>,
    pub companies: Vec<String>,
    pub cities: Vec<String>,
    pub countries: Vec<String>,
    pub phone1s: Vec<String>,
    pub phone2s: Vec<String>,
    pub emails: Vec<String>,
    pub subscription_dates: Vec<NaiveDate>,
    pub websites: Vec<String>,
}

impl CustomersData {
    pub fn from_records(records: Vec<CustomerRecord>) -> Self {
        let n = records.len();
        let mut data = Self {
            customer_ids: Vec::with_capacity(n),
            first_names: Vec::with_capacity(n),
            last_names: Vec::with_capacity(n),
            companies: Vec::with_capacity(n),
            cities: Vec::with_capacity(n),
            countries: Vec::with_capacity(n),
            phone1s: Vec::with_capacity(n),
            phone2s: Vec::with_capacity(n),
            emails: Vec::with_capacity(n),
            subscription_dates: Vec::with_capacity(n),
            websites: Vec::with_capacity(n),
        };

        for record in records {
            data.customer_ids.push(record.customer_id);
            data.first_names.push(record.first_name);
            data.last_names.push(record.last_name);
            data.companies.push(record.company);
            data.cities.push(record.city);
            data.countries.push(record.country);
            data.phone1s.push(record.phone1);
            data.phone2s.push(record.phone2);
            data.emails.push(record.email);
            data.subscription_dates.push(record.subscription_date);
            data.websites.push(record.website);
        }

        data
    }

    pub fn len(&self) -> usize {
        self.customer_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customer_ids.is_empty()
    }
}

fn insert_sql(table: &str) -> String {
    format!(
        r#"INSERT INTO {table} (
            customer_id, first_name, last_name, company, city, country,
            phone1, phone2, email, subscription_date, website
           )
           SELECT * FROM UNNEST(
               $1::text[],
               $2::text[],
               $3::text[],
               $4::text[],
               $5::text[],
               $6::text[],
               $7::text[],
               $8::text[],
               $9::text[],
               $10::date[],
               $11::text[]
           )"#
    )
}

/// [`BulkWriter`] backed by a PostgreSQL pool.
pub struct PgBulkWriter {
    pool: PgPool,
    table: String,
    sql: String,
}

impl PgBulkWriter {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Result<Self, ConfigError> {
        let table = table.into();
        if !is_valid_table_name(&table) {
            return Err(ConfigError::InvalidTable(table));
        }
        let sql = insert_sql(&table);
        Ok(Self { pool, table, sql })
    }

    /// Writer for the table named by `config`.
    pub fn from_config(pool: PgPool, config: &DatabaseConfig) -> Result<Self, ConfigError> {
        Self::new(pool, config.table.as_str())
    }

    /// Insert all rows of `data` with one statement.
    pub async fn insert_customers(&self, data: &CustomersData) -> Result<usize, sqlx::Error> {
        if data.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(&self.sql)
            .bind(&data.customer_ids)
            .bind(&data.first_names)
            .bind(&data.last_names)
            .bind(&data.companies)
            .bind(&data.cities)
            .bind(&data.countries)
            .bind(&data.phone1s)
            .bind(&data.phone2s)
            .bind(&data.emails)
            .bind(&data.subscription_dates)
            .bind(&data.websites)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() as usize)
    }
}

impl BulkWriter for PgBulkWriter {
    async fn write(&mut self, batch: Batch) -> Result<WriteResult, StorageError> {
        let sequence = batch.sequence;
        let count = batch.len();
        let data = CustomersData::from_records(batch.records);

        let rows_written = self.insert_customers(&data).await?;
        if rows_written != count {
            log::debug!(
                "batch {}: tried to insert {} customers into {}, {} rows affected",
                sequence,
                count,
                self.table,
                rows_written
            );
        }

        log::trace!("bulk inserted {} customers (batch {})", rows_written, sequence);
        Ok(WriteResult { rows_written })
    }
}
