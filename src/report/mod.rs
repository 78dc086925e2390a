//! Reports over the transformed message/status history.
//!
//! The dataset is read once through a short-lived connection; each report is
//! then a pure computation rendered to an SVG file or a line of text.

/// Pure computations over the report rows
pub mod analysis;
/// SVG chart rendering
pub mod charts;

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::db::Warehouse;
use crate::error::Result;
use crate::metrics::PipelineMetrics;
use crate::models::MessageStatusRow;

pub use analysis::{
    histogram_bins, last_week_status_counts, read_fraction, read_fraction_text, time_to_read_seconds,
    week_start, weekly_user_trends, ReadFraction,
};

/// Buckets in the time-to-read histogram
pub const TIME_TO_READ_BINS: usize = 30;

/// Notice printed instead of an empty time-to-read plot
pub const NO_READ_TIMES: &str = "No messages with read times available to plot.";

/// The available reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// Weekly total and active users chart
    UserTrends,
    /// Read fraction summary line
    ReadFraction,
    /// Time-to-read histogram
    TimeToRead,
    /// Last-week outbound status chart
    Statuses,
}

impl ReportKind {
    /// Every report, in output order
    pub const ALL: [Self; 4] = [Self::UserTrends, Self::ReadFraction, Self::TimeToRead, Self::Statuses];

    const fn file_stem(self) -> &'static str {
        match self {
            Self::UserTrends => "user_trends",
            Self::ReadFraction => "read_fraction",
            Self::TimeToRead => "time_to_read",
            Self::Statuses => "outbound_message_statuses",
        }
    }
}

/// What a report produced
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutput {
    /// Chart written to this file
    Chart(PathBuf),
    /// Text summary
    Text(String),
    /// Nothing to plot; the notice explains why
    Skipped(String),
}

impl fmt::Display for ReportOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chart(path) => write!(f, "Chart written to {}", path.display()),
            Self::Text(text) | Self::Skipped(text) => f.write_str(text),
        }
    }
}

/// Compute one report and render it under `out_dir`
pub fn render_report(kind: ReportKind, rows: &[MessageStatusRow], out_dir: &Path) -> Result<ReportOutput> {
    let chart_path = || out_dir.join(format!("{}.svg", kind.file_stem()));

    let output = match kind {
        ReportKind::UserTrends => {
            std::fs::create_dir_all(out_dir)?;
            let path = chart_path();
            charts::render_user_trends(&weekly_user_trends(rows), &path)?;
            ReportOutput::Chart(path)
        }
        ReportKind::ReadFraction => ReportOutput::Text(read_fraction_text(&read_fraction(rows))),
        ReportKind::TimeToRead => {
            let seconds = time_to_read_seconds(rows);
            if seconds.is_empty() {
                warn!("{}", NO_READ_TIMES);
                ReportOutput::Skipped(NO_READ_TIMES.to_string())
            } else {
                std::fs::create_dir_all(out_dir)?;
                let path = chart_path();
                charts::render_time_to_read(&histogram_bins(&seconds, TIME_TO_READ_BINS), &path)?;
                ReportOutput::Chart(path)
            }
        }
        ReportKind::Statuses => {
            std::fs::create_dir_all(out_dir)?;
            let path = chart_path();
            charts::render_status_counts(&last_week_status_counts(rows), &path)?;
            ReportOutput::Chart(path)
        }
    };

    info!(report = kind.file_stem(), "Report rendered");
    Ok(output)
}

/// Read the configured view and render the requested reports
pub async fn run_reports(config: &AppConfig, kinds: &[ReportKind]) -> Result<Vec<ReportOutput>> {
    let warehouse = Warehouse::connect(
        &config.get_database_url(),
        &config.database.schema,
        config.connect_timeout(),
    )
    .await?;
    let rows = warehouse.message_status_history(&config.report.view).await?;
    drop(warehouse);

    PipelineMetrics::default().record_report_rows(rows.len());

    let out_dir = PathBuf::from(&config.report.output_dir);
    kinds
        .iter()
        .map(|kind| render_report(*kind, &rows, &out_dir))
        .collect()
}
