use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::{info, warn};

use burnin_parser::{parse_results, DataReader};

use crate::classifier::{select_row, ClassifiedRow, ClassifierConfig, Selection};
use crate::clock::LocalClock;
use crate::config::PipelineConfig;
use crate::db::{self, DbPool, NewTest};
use crate::error::{PipelineError, Result};
use crate::matcher::{self, DataFileCandidate, FileMatch, MatchTarget};
use crate::report::RunReport;

/// One ingestion pass over the pending directories. Sequential by design:
/// each file's consumption must be visible to the next file's candidate scan,
/// so there is no intra-run parallelism.
pub async fn run(pool: &DbPool, config: &PipelineConfig) -> Result<RunReport> {
    run_pass(
        pool,
        config,
        &config.pending_results_dir(),
        &config.pending_data_dir(),
        true,
    )
    .await
}

/// Shared pass used by both the normal ingest (pending directories, files
/// relocated on success) and reprocessing (processed archive, no relocation).
pub(crate) async fn run_pass(
    pool: &DbPool,
    config: &PipelineConfig,
    results_dir: &Path,
    data_dir: &Path,
    relocate: bool,
) -> Result<RunReport> {
    for dir in [results_dir, data_dir] {
        if !dir.is_dir() {
            return Err(PipelineError::Environment(format!(
                "directory {} does not exist",
                dir.display()
            )));
        }
    }

    let clock = LocalClock::new(config.timezone);

    // The database is the single source of truth for what has been consumed;
    // file locations are only cleanup. Both sets grow during the run so a
    // data file claimed by one results file is invisible to the next.
    let mut ingested = db::ingested_results_files(pool).await?;
    let mut consumed = db::used_data_files(pool).await?;

    let candidates = matcher::scan_candidates(data_dir)?;
    let pending = list_results_files(results_dir)?;
    info!(
        results = pending.len(),
        data_candidates = candidates.len(),
        "starting ingestion pass"
    );

    let mut report = RunReport::default();

    for file_name in pending {
        if ingested.contains(&file_name) {
            info!(file = %file_name, "results file already ingested, skipping");
            report.duplicates.push(file_name);
            continue;
        }

        let outcome = process_results_file(
            pool,
            config,
            &clock,
            results_dir,
            data_dir,
            &file_name,
            &candidates,
            &consumed,
        )
        .await;

        match outcome {
            Ok(FileOutcome::Exact { data_file }) => {
                ingested.insert(file_name.clone());
                consumed.insert(data_file.clone());
                if relocate {
                    relocate_pair(config, results_dir, data_dir, &file_name, &data_file);
                }
                report.exact.push(file_name);
            }
            Ok(FileOutcome::Closest { data_file, delta }) => {
                ingested.insert(file_name.clone());
                consumed.insert(data_file.clone());
                if relocate {
                    relocate_pair(config, results_dir, data_dir, &file_name, &data_file);
                }
                report.record_closest(file_name, data_file, delta);
            }
            Ok(FileOutcome::Unmatched { reason }) => {
                warn!(file = %file_name, %reason, "no data file found, leaving for review");
                report.record_unmatched(file_name, reason);
            }
            Ok(FileOutcome::Rejected) => {
                warn!(
                    file = %file_name,
                    "every candidate row has an inverted date range, rejecting file"
                );
                report.rejected.push(file_name);
            }
            Err(err) => {
                // Row- and file-scoped failures never abort the run; the file
                // stays in place and the next run retries it.
                warn!(file = %file_name, error = %err, "failed to ingest results file");
                report.record_error(file_name, err.to_string());
            }
        }
    }

    Ok(report)
}

enum FileOutcome {
    Exact {
        data_file: String,
    },
    Closest {
        data_file: String,
        delta: chrono::Duration,
    },
    Unmatched {
        reason: String,
    },
    Rejected,
}

#[allow(clippy::too_many_arguments)]
async fn process_results_file(
    pool: &DbPool,
    config: &PipelineConfig,
    clock: &LocalClock,
    results_dir: &Path,
    data_dir: &Path,
    file_name: &str,
    candidates: &[DataFileCandidate],
    consumed: &HashSet<String>,
) -> Result<FileOutcome> {
    let content = std::fs::read_to_string(results_dir.join(file_name))?;
    let parsed = parse_results(&content)?;
    for skip in &parsed.skipped {
        warn!(
            file = %file_name,
            line = skip.line_index,
            "skipping result row: {}",
            skip.message
        );
    }
    if parsed.rows.is_empty() {
        return Err(PipelineError::Ingest(format!(
            "results file {file_name} contained no usable rows"
        )));
    }

    let classifier_config = ClassifierConfig {
        debug_firmware: &config.debug_firmware,
        min_duration: config.min_duration(),
    };
    let chosen = match select_row(parsed.rows, &classifier_config) {
        Selection::Chosen(chosen) => chosen,
        Selection::AllRowsUntrusted => return Ok(FileOutcome::Rejected),
    };

    let target = MatchTarget {
        serial: chosen.row.serial_number.clone(),
        start_utc: clock.to_utc(chosen.row.start_time),
    };

    let matched = matcher::match_data_file(&target, clock, candidates, consumed);
    let (data_file, delta) = match matched {
        FileMatch::Exact(name) => (name, None),
        FileMatch::Closest { file, delta } => (file, Some(delta)),
        FileMatch::Unmatched => {
            return Ok(FileOutcome::Unmatched {
                reason: format!(
                    "no unconsumed data file for serial {} within one day of test start",
                    target.serial
                ),
            });
        }
    };

    persist(pool, config, clock, data_dir, file_name, &chosen, &data_file).await?;

    Ok(match delta {
        None => FileOutcome::Exact { data_file },
        Some(delta) => FileOutcome::Closest { data_file, delta },
    })
}

/// One transaction per file: the Test row plus all of its data points commit
/// together, so a crash mid-insert can never leave a Test without its series.
async fn persist(
    pool: &DbPool,
    config: &PipelineConfig,
    clock: &LocalClock,
    data_dir: &Path,
    results_file: &str,
    chosen: &ClassifiedRow,
    data_file: &str,
) -> Result<()> {
    let row = &chosen.row;
    let new_test = NewTest {
        serial_number: &row.serial_number,
        start_utc: clock.to_utc(row.start_time),
        end_utc: clock.to_utc(row.end_time),
        start_local: row.start_time,
        end_local: row.end_time,
        firmware: &row.firmware,
        status: chosen.status.as_str(),
        invalid_reason: chosen.reason.map(|r| r.as_str()),
        output_a: row.output_a.as_deref(),
        output_b: row.output_b.as_deref(),
        status_flags: row.status_flags.as_deref(),
        failure_description: row.failure_description.as_deref(),
        failure_time: row.failure_time.map(|t| clock.to_utc(t)),
        source_file: results_file,
    };

    let file = File::open(data_dir.join(data_file))?;
    let mut reader = DataReader::new(BufReader::new(file))?;

    let mut tx = pool.begin().await?;
    let test_id = db::insert_test(&mut tx, &new_test).await?;

    let mut total_rows = 0usize;
    loop {
        let batch = reader.next_batch(config.insert_batch_size)?;
        if batch.is_empty() {
            break;
        }
        total_rows += batch.len();
        db::insert_data_points(&mut tx, test_id, data_file, clock, &batch).await?;
    }
    tx.commit().await?;

    for skip in &reader.skipped {
        warn!(
            file = %data_file,
            line = skip.line_index,
            "skipped data row: {}",
            skip.message
        );
    }
    info!(
        results_file = %results_file,
        data_file = %data_file,
        test_id,
        rows = total_rows,
        status = chosen.status.as_str(),
        "ingested test"
    );

    Ok(())
}

fn list_results_files(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.to_ascii_lowercase().ends_with(".csv") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Best-effort archive move after a committed write. The database already
/// records both filenames as used, so a failed move only costs a duplicate
/// skip on the next run, never a double ingest.
fn relocate_pair(
    config: &PipelineConfig,
    results_dir: &Path,
    data_dir: &Path,
    results_file: &str,
    data_file: &str,
) {
    let moves = [
        (
            results_dir.join(results_file),
            config.processed_results_dir().join(results_file),
        ),
        (
            data_dir.join(data_file),
            config.processed_data_dir().join(data_file),
        ),
    ];

    for (from, to) in moves {
        if let Err(err) = move_file(&from, &to) {
            warn!(
                from = %from.display(),
                to = %to.display(),
                error = %err,
                "failed to relocate processed file"
            );
        }
    }
}

fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        // Rename fails across filesystems; fall back to copy + remove.
        Err(_) => {
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)
        }
    }
}
