pub mod classifier;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod matcher;
pub mod report;
pub mod reprocess;
