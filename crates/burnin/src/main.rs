use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use tracing::info;
use tracing_subscriber::EnvFilter;

use burnin_core::{config::PipelineConfig, db, ingest, report::RunReport, reprocess};

/// Operator CLI for the inverter burn-in ingestion pipeline.
#[derive(Parser, Debug)]
#[command(author, version, about = "Burn-in test ingestion pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest pending results and data files into the database
    Ingest(RunArgs),
    /// Wipe the store and rebuild it from the processed-file archive
    Reprocess(ReprocessArgs),
    /// Run database migrations
    Migrate,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Path to the pipeline configuration file
    #[arg(short, long, default_value = "burnin.toml")]
    config: PathBuf,

    /// Emit the run report as JSON instead of tables
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ReprocessArgs {
    /// Path to the pipeline configuration file
    #[arg(short, long, default_value = "burnin.toml")]
    config: PathBuf,

    /// Confirm the destructive truncate of all pipeline tables
    #[arg(long)]
    yes: bool,

    /// Emit the run report as JSON instead of tables
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Ingest(args) => {
            let config = PipelineConfig::load(&args.config)?;
            let pool = connect_pool().await?;
            let report = ingest::run(&pool, &config).await?;
            print_report(&report, args.json)?;
            Ok(())
        }
        Command::Reprocess(args) => {
            if !args.yes {
                bail!("reprocess truncates all pipeline tables; re-run with --yes to confirm");
            }
            let config = PipelineConfig::load(&args.config)?;
            let pool = connect_pool().await?;
            let report = reprocess::run(&pool, &config).await?;
            print_report(&report, args.json)?;
            Ok(())
        }
        Command::Migrate => {
            let pool = connect_pool().await?;
            db::run_migrations(&pool).await?;
            info!("Database migrations applied");
            Ok(())
        }
    }
}

async fn connect_pool() -> Result<db::DbPool> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")
        .or_else(|_| std::env::var("BURNIN_DATABASE_URL"))
        .context("DATABASE_URL (or BURNIN_DATABASE_URL) must be set")?;
    Ok(db::connect(&database_url).await?)
}

fn print_report(report: &RunReport, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let mut summary = Table::new();
    summary.load_preset(UTF8_FULL).set_header(vec![
        "Exact",
        "Closest",
        "Unmatched",
        "Duplicates",
        "Rejected",
        "Errors",
    ]);
    summary.add_row(vec![
        Cell::new(report.exact.len()),
        Cell::new(report.closest.len()),
        Cell::new(report.unmatched.len()),
        Cell::new(report.duplicates.len()),
        Cell::new(report.rejected.len()),
        Cell::new(report.errors.len()),
    ]);

    println!("\n--- Ingestion Summary ({} files) ---", report.total());
    println!("{summary}");

    if !report.closest.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_header(vec!["Results file", "Data file", "Delta (s)"]);
        for entry in &report.closest {
            table.add_row(vec![
                Cell::new(&entry.results_file),
                Cell::new(&entry.data_file),
                Cell::new(entry.delta_seconds),
            ]);
        }
        println!("Closest matches (audit these):");
        println!("{table}");
    }

    for entry in &report.unmatched {
        println!("  ⚠️  unmatched: {} ({})", entry.results_file, entry.reason);
    }
    for file in &report.rejected {
        println!("  ⚠️  rejected (all rows bad): {file}");
    }
    for entry in &report.errors {
        println!("  ❌ error: {} ({})", entry.file, entry.message);
    }

    let ingested = report.exact.len() + report.closest.len();
    println!("\n  ✅ Ingested: {ingested}");
    Ok(())
}
