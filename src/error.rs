//! Error types for the whatsapp-etl library.
//!
//! Every stage returns [`PipelineError`]; the binary wraps it in `anyhow`
//! so the exit code of a failed stage is nonzero.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Errors that can occur while running a pipeline stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Download of a spreadsheet export failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Export answered with a non-success status
    #[error("{url} answered with HTTP {status}")]
    HttpStatus {
        /// Requested URL
        url: String,
        /// Status code returned
        status: u16,
    },

    /// CSV/TSV parse or write errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database errors, including failed casts after a bulk load
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// No landed file matched the expected name pattern
    #[error("No {prefix} file found in {}", dir.display())]
    NoInputFile {
        /// File name prefix that was searched for
        prefix: String,
        /// Directory that was searched
        dir: PathBuf,
    },

    /// Landed file has a column the destination table does not know
    #[error("Column {column:?} in {} is not a column of {table}", file.display())]
    UnknownColumn {
        /// Destination table
        table: String,
        /// Offending column
        column: String,
        /// Landed file
        file: PathBuf,
    },

    /// Export or landed file has no header row
    #[error("{0} has no header row")]
    EmptyHeader(String),

    /// A transform step exited unsuccessfully
    #[error("dbt {step} failed: {status}")]
    Transform {
        /// dbt sub-command that failed
        step: String,
        /// Exit status of the child process
        status: ExitStatus,
    },

    /// Chart could not be drawn or written
    #[error("Chart error: {0}")]
    Chart(String),

    /// Input rejected by validation
    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Convenience type alias for Result with `PipelineError`
pub type Result<T> = std::result::Result<T, PipelineError>;

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        Self::Validation(err.to_string())
    }
}
