//! Streaming CSV import of customer records into PostgreSQL.
//!
//! See [`import`] for the pipeline itself. [`config`] reads runtime settings
//! from the environment and [`db`] owns pool construction and migrations.

pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod models;

use env_logger::Env;
use std::sync::Once;

static LOGGER: Once = Once::new();

/// Initialise `env_logger` once per process. `RUST_LOG` overrides the default.
pub fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(Env::default().default_filter_or("info,sqlx=warn")).init();
    });
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use crate::error::StorageError;
    use crate::import::{Batch, BulkWriter, WriteResult};
    use crate::models::{CUSTOMER_COLUMNS, CustomerRecord};

    pub use database::{TestDatabase, TestDatabaseError};

    /// Render a customer CSV with a header and `rows` valid data rows.
    ///
    /// Customer ids are `CUST000000`, `CUST000001`, ... in row order.
    pub fn customer_csv(rows: usize) -> String {
        let mut csv = CUSTOMER_COLUMNS.join(",");
        csv.push('\n');
        for n in 0..rows {
            csv.push_str(&customer_line(n));
            csv.push('\n');
        }
        csv
    }

    /// One valid data line for row `n`.
    pub fn customer_line(n: usize) -> String {
        let day = n % 28 + 1;
        let month = n % 12 + 1;
        format!(
            "CUST{n:06},First{n},Last{n},\"Company {n}, Ltd\",City{n},Country{n},555-{n:04},555-{n:04}x1,customer{n}@example.com,{day:02}-{month:02}-2023,https://example.com/{n}"
        )
    }

    /// In-memory [`BulkWriter`] that remembers every batch it was given.
    ///
    /// Can be told to reject a specific call to exercise storage failures.
    #[derive(Debug, Default)]
    pub struct RecordingWriter {
        batches: Vec<Batch>,
        calls: usize,
        fail_on_call: Option<usize>,
    }

    impl RecordingWriter {
        pub fn new() -> Self {
            Self::default()
        }

        /// Reject the `call`-th write (1-based) with a storage error.
        pub fn failing_on(call: usize) -> Self {
            Self {
                fail_on_call: Some(call),
                ..Self::default()
            }
        }

        /// Number of write calls, including rejected ones.
        pub fn calls(&self) -> usize {
            self.calls
        }

        /// Sizes of the successfully written batches, in write order.
        pub fn batch_sizes(&self) -> Vec<usize> {
            self.batches.iter().map(Batch::len).collect()
        }

        pub fn batches(&self) -> &[Batch] {
            &self.batches
        }

        pub fn records(&self) -> impl Iterator<Item = &CustomerRecord> {
            self.batches.iter().flat_map(|batch| batch.records.iter())
        }
    }

    impl BulkWriter for RecordingWriter {
        async fn write(&mut self, batch: Batch) -> Result<WriteResult, StorageError> {
            self.calls += 1;
            if self.fail_on_call == Some(self.calls) {
                return Err(StorageError::Rejected {
                    batch: batch.sequence,
                    message: "simulated storage failure".to_string(),
                });
            }

            let rows_written = batch.len();
            self.batches.push(batch);
            Ok(WriteResult { rows_written })
        }
    }

    /// Throwaway PostgreSQL databases for the integration tests in `tests/`.
    ///
    /// Every [`TestDatabase`] gets its own database inside a disposable
    /// container, so tests that insert customers never see each other's rows.
    pub mod database {
        use crate::config::DatabaseConfig;
        use crate::models::CustomerRecord;
        use log::LevelFilter;
        use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
        use sqlx::{ConnectOptions, PgPool};
        use testcontainers_modules::postgres::Postgres;
        use testcontainers_modules::testcontainers::{
            ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
        };
        use thiserror::Error;
        use tokio::runtime::Handle;
        use uuid::Uuid;

        static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("migration error: {0}")]
            Migration(#[from] sqlx::migrate::MigrateError),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        pub struct TestDatabase {
            pool: Option<PgPool>,
            admin_options: PgConnectOptions,
            url: String,
            database_name: String,
            container: Option<ContainerAsync<Postgres>>,
        }

        impl TestDatabase {
            /// A fresh database with the `customers` table already migrated.
            pub async fn new() -> Result<Self, TestDatabaseError> {
                let db = Self::provision().await?;
                MIGRATOR.run(db.pool()).await?;
                Ok(db)
            }

            /// A fresh database with no migrations applied.
            pub async fn unmigrated() -> Result<Self, TestDatabaseError> {
                Self::provision().await
            }

            async fn provision() -> Result<Self, TestDatabaseError> {
                let container = Postgres::default().start().await?;

                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;
                let server_url = format!("postgres://postgres:postgres@{host}:{port}");

                let admin_options: PgConnectOptions = format!("{server_url}/postgres").parse()?;
                let admin_options = admin_options.log_statements(LevelFilter::Off);

                let admin_pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(admin_options.clone())
                    .await?;

                let database_name = format!("customers_{}", Uuid::new_v4().simple());
                sqlx::query(&format!("CREATE DATABASE \"{database_name}\" TEMPLATE template0"))
                    .execute(&admin_pool)
                    .await?;
                admin_pool.close().await;

                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect_with(admin_options.clone().database(&database_name))
                    .await?;

                Ok(Self {
                    pool: Some(pool),
                    admin_options,
                    url: format!("{server_url}/{database_name}"),
                    database_name,
                    container: Some(container),
                })
            }

            /// Pool on the test database. Panics after [`TestDatabase::close`].
            pub fn pool(&self) -> &PgPool {
                self.pool.as_ref().expect("test database pool is available")
            }

            pub fn pool_clone(&self) -> PgPool {
                self.pool().clone()
            }

            /// Settings that point the import at this database, as the CLI would.
            pub fn database_config(&self) -> DatabaseConfig {
                DatabaseConfig::new(self.url.clone())
            }

            pub async fn customer_count(&self) -> Result<i64, sqlx::Error> {
                sqlx::query_scalar("SELECT COUNT(*) FROM customers")
                    .fetch_one(self.pool())
                    .await
            }

            /// Stored customers in insertion order.
            pub async fn customers(&self) -> Result<Vec<CustomerRecord>, sqlx::Error> {
                sqlx::query_as(
                    "SELECT customer_id, first_name, last_name, company, city, country, \
                     phone1, phone2, email, subscription_date, website \
                     FROM customers ORDER BY id",
                )
                .fetch_all(self.pool())
                .await
            }

            /// Close pool connections and drop the database.
            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                if let Some(pool) = self.pool.take() {
                    pool.close().await;
                }
                drop_database(self.admin_options.clone(), &self.database_name).await?;
                self.container.take();
                Ok(())
            }
        }

        async fn drop_database(
            admin_options: PgConnectOptions,
            database_name: &str,
        ) -> Result<(), sqlx::Error> {
            let admin_pool = PgPoolOptions::new()
                .max_connections(1)
                .connect_with(admin_options)
                .await?;

            sqlx::query(&format!("DROP DATABASE IF EXISTS \"{database_name}\" WITH (FORCE)"))
                .execute(&admin_pool)
                .await?;
            Ok(())
        }

        // A test that panics before `close` still cleans up when a runtime is around.
        impl Drop for TestDatabase {
            fn drop(&mut self) {
                if let (Some(pool), Ok(handle)) = (self.pool.take(), Handle::try_current()) {
                    let admin_options = self.admin_options.clone();
                    let database_name = self.database_name.clone();
                    handle.spawn(async move {
                        pool.close().await;
                        let _ = drop_database(admin_options, &database_name).await;
                    });
                }
                self.container.take();
            }
        }
    }
}
