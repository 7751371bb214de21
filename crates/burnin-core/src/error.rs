// crates/burnin-core/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Parser(#[from] burnin_parser::ParserError),

    #[error("Timestamp error: {0}")]
    Timestamp(#[from] crate::clock::TimestampParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ingestion error: {0}")]
    Ingest(String),

    #[error("Environment error: {0}")]
    Environment(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
