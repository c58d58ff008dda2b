use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use customer_import::config::{DatabaseConfig, ImportConfig};
use customer_import::import::{ImportPipeline, PgBulkWriter};
use customer_import::{db, init_logger};

#[derive(Parser, Debug)]
#[command(
    name = "customer-import",
    about = "Import a customer CSV export into PostgreSQL in batches"
)]
struct Args {
    /// CSV file with a header row and one customer per line.
    file: PathBuf,

    /// Records per bulk insert (defaults to IMPORT_BATCH_SIZE or 5000).
    #[arg(long)]
    batch_size: Option<usize>,

    /// Abort on the first invalid row instead of skipping it.
    #[arg(long)]
    strict: bool,

    /// Destination table (defaults to IMPORT_TABLE or `customers`).
    #[arg(long)]
    table: Option<String>,

    /// Do not apply pending migrations before importing.
    #[arg(long)]
    skip_migrations: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    init_logger();

    let args = Args::parse();

    let mut config = ImportConfig::from_env();
    if let Some(batch_size) = args.batch_size {
        config = config.with_batch_size(batch_size);
    }
    if args.strict {
        config = config.with_strict(true);
    }

    let mut db_config = DatabaseConfig::from_env()?;
    if let Some(table) = args.table {
        db_config = db_config.with_table(table);
    }

    if let Err(err) = config.validate().and_then(|()| db_config.validate()) {
        writeln!(io::stderr(), "error: {err}")?;
        return Ok(ExitCode::from(2));
    }

    let pool = db::connect(&db_config).await?;

    if !args.skip_migrations {
        db::run_migrations(&pool).await?;
    }

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupt received, stopping import at the next row");
            ctrl_c_cancel.cancel();
        }
    });

    let writer = PgBulkWriter::from_config(pool.clone(), &db_config)?;
    let mut pipeline = ImportPipeline::new(config, writer);
    let result = pipeline.run(&args.file, cancel).await;

    println!("{}", serde_json::to_string_pretty(&result.report())?);

    pool.close().await;

    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
