// crates/burnin-core/src/db.rs

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use burnin_parser::DataRow;

use crate::clock::LocalClock;
use crate::error::Result;

pub type DbPool = Pool<Postgres>;

/// Establish a Postgres connection pool with sensible defaults for a
/// single-worker batch job.
pub async fn connect(database_url: &str) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run database migrations embedded at compile time.
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Data filenames already recorded against any test_data row. This set is
/// the pipeline's idempotency ledger for the data side: a filename in here
/// must never be ingested again, nor offered to the matcher.
pub async fn used_data_files(pool: &DbPool) -> Result<HashSet<String>> {
    let names: Vec<String> =
        sqlx::query_scalar(r#"SELECT DISTINCT source_file FROM test_data"#)
            .fetch_all(pool)
            .await?;
    Ok(names.into_iter().collect())
}

/// Results filenames that already produced a Test. Dedup key for the results
/// side; the pipeline only ever inserts new Tests, never updates, so a name
/// in here means the whole file is a no-op skip.
pub async fn ingested_results_files(pool: &DbPool) -> Result<HashSet<String>> {
    let names: Vec<String> = sqlx::query_scalar(r#"SELECT source_file FROM tests"#)
        .fetch_all(pool)
        .await?;
    Ok(names.into_iter().collect())
}

#[derive(Debug)]
pub struct NewTest<'a> {
    pub serial_number: &'a str,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    /// Legacy civil-time columns, kept consistent with the UTC columns for
    /// older dashboard queries.
    pub start_local: NaiveDateTime,
    pub end_local: NaiveDateTime,
    pub firmware: &'a str,
    pub status: &'a str,
    pub invalid_reason: Option<&'a str>,
    pub output_a: Option<&'a str>,
    pub output_b: Option<&'a str>,
    pub status_flags: Option<&'a str>,
    pub failure_description: Option<&'a str>,
    pub failure_time: Option<DateTime<Utc>>,
    pub source_file: &'a str,
}

/// Lazily creates the inverter for a serial number and returns its id.
/// Inverters are append-only and never mutated after creation.
pub async fn get_or_create_inverter(
    tx: &mut Transaction<'_, Postgres>,
    serial_number: &str,
) -> Result<i32> {
    sqlx::query(
        r#"
            INSERT INTO inverters (serial_number)
            VALUES ($1)
            ON CONFLICT (serial_number) DO NOTHING
        "#,
    )
    .bind(serial_number)
    .execute(&mut **tx)
    .await?;

    let inv_id: i32 = sqlx::query_scalar(r#"SELECT inv_id FROM inverters WHERE serial_number = $1"#)
        .bind(serial_number)
        .fetch_one(&mut **tx)
        .await?;
    Ok(inv_id)
}

pub async fn insert_test(tx: &mut Transaction<'_, Postgres>, test: &NewTest<'_>) -> Result<i64> {
    let inv_id = get_or_create_inverter(tx, test.serial_number).await?;

    let test_id: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO tests (
                inv_id, start_time, end_time, start_time_local, end_time_local,
                firmware, status, invalid_reason, output_a, output_b,
                status_flags, failure_description, failure_time, source_file
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING test_id
        "#,
    )
    .bind(inv_id)
    .bind(test.start_utc)
    .bind(test.end_utc)
    .bind(test.start_local)
    .bind(test.end_local)
    .bind(test.firmware)
    .bind(test.status)
    .bind(test.invalid_reason)
    .bind(test.output_a)
    .bind(test.output_b)
    .bind(test.status_flags)
    .bind(test.failure_description)
    .bind(test.failure_time)
    .bind(test.source_file)
    .fetch_one(&mut **tx)
    .await?;

    Ok(test_id)
}

/// Bulk-inserts one batch of time-series rows, every row tagged with the data
/// file's base name. Sample timestamps are civil time in the file and
/// normalized to UTC here.
pub async fn insert_data_points(
    tx: &mut Transaction<'_, Postgres>,
    test_id: i64,
    source_file: &str,
    clock: &LocalClock,
    rows: &[DataRow],
) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "INSERT INTO test_data (
            test_id, timestamp, dc_voltage, ac_voltage_a, ac_voltage_b,
            power_a, power_b, frequency_a, frequency_b, energy_a, energy_b,
            status_flags, latched_flags, fault_code, source_file
        ) ",
    );

    builder.push_values(rows, |mut b, row| {
        b.push_bind(test_id)
            .push_bind(clock.to_utc(row.timestamp))
            .push_bind(row.dc_voltage)
            .push_bind(row.ac_voltage_a)
            .push_bind(row.ac_voltage_b)
            .push_bind(row.power_a)
            .push_bind(row.power_b)
            .push_bind(row.frequency_a)
            .push_bind(row.frequency_b)
            .push_bind(row.energy_a)
            .push_bind(row.energy_b)
            .push_bind(row.status_flags)
            .push_bind(row.latched_flags)
            .push_bind(row.fault_code.as_deref())
            .push_bind(source_file);
    });

    builder.build().execute(&mut **tx).await?;
    Ok(())
}

/// Wipes all pipeline tables and their identity sequences. Only the
/// reprocessing orchestrator calls this.
pub async fn truncate_all(pool: &DbPool) -> Result<()> {
    sqlx::query(r#"TRUNCATE test_data, tests, inverters RESTART IDENTITY CASCADE"#)
        .execute(pool)
        .await?;
    Ok(())
}
