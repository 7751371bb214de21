use tracing::info;

use crate::config::PipelineConfig;
use crate::db::{self, DbPool};
use crate::error::Result;
use crate::ingest;
use crate::report::RunReport;

/// Wipes the store and rebuilds it from the processed-file archive. Used to
/// regenerate state after a schema or classification change; the archive
/// directories are the system of record for raw files, so this is lossless.
pub async fn run(pool: &DbPool, config: &PipelineConfig) -> Result<RunReport> {
    info!("truncating pipeline tables before reprocessing");
    db::truncate_all(pool).await?;

    // Files stay where they are: the archive is already the processed area,
    // and the truncate emptied the idempotency ledger, so every file is
    // eligible again.
    ingest::run_pass(
        pool,
        config,
        &config.processed_results_dir(),
        &config.processed_data_dir(),
        false,
    )
    .await
}
