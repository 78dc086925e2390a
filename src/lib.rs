//! WhatsApp ETL - spreadsheet exports to Postgres and reports
//!
//! A batch pipeline that lands two published CSV exports (messages and
//! delivery statuses) as dated TSV files, replaces the `messages` and
//! `statuses` tables with them, runs the dbt project over the result and
//! renders descriptive reports from the transformed view.
//!
//! # Stages
//!
//! - Fetch: download, drop fully empty rows, land `<prefix>_<YYYYMMDD>.tsv`
//! - Load: drop + create, bulk `COPY`, cast text columns to timestamptz/UUID
//! - Transform: `dbt deps` and `dbt build`
//! - Report: user trends, read fraction, time to read, last-week statuses

/// Configuration management
pub mod config;
/// Postgres connection and statements
pub mod db;
/// Error types
pub mod error;
/// Fetch stage
pub mod fetch;
/// Landed TSV files
pub mod landing;
/// Load stage
pub mod load;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Stage sequencing for a full run
pub mod pipeline;
/// Reports over the transformed view
pub mod report;
/// Destination table definitions
pub mod schema;
/// Transform stage
pub mod transform;
/// Input validation and sanitization
pub mod validation;

// Re-export key components for easier access
pub use config::AppConfig;
pub use error::{PipelineError, Result};
pub use models::{Dataset, LandedFile, LoadReport, MessageStatusRow};
pub use pipeline::Pipeline;
