use anyhow::Result;
use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Metric names emitted by the pipeline stages
#[derive(Debug, Clone, Copy)]
pub struct PipelineMetrics {
    /// Rows written to landed files
    pub rows_fetched_total: &'static str,
    /// Fully empty rows discarded while landing
    pub rows_dropped_total: &'static str,
    /// Rows bulk-copied into tables
    pub rows_loaded_total: &'static str,
    /// Stage duration histogram
    pub stage_duration: &'static str,
    /// Stage runs by outcome
    pub stage_runs_total: &'static str,
    /// Rows read for the last report run
    pub report_rows: &'static str,
    /// Failed stages
    pub errors_total: &'static str,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self {
            rows_fetched_total: "whatsapp_etl_rows_fetched_total",
            rows_dropped_total: "whatsapp_etl_rows_dropped_total",
            rows_loaded_total: "whatsapp_etl_rows_loaded_total",
            stage_duration: "whatsapp_etl_stage_duration_seconds",
            stage_runs_total: "whatsapp_etl_stage_runs_total",
            report_rows: "whatsapp_etl_report_rows",
            errors_total: "whatsapp_etl_errors_total",
        }
    }
}

impl PipelineMetrics {
    /// Install the no-op recorder. A real exporter can be installed instead
    /// before any stage runs.
    pub fn init() -> Result<()> {
        metrics::set_global_recorder(metrics::NoopRecorder)
            .map_err(|e| anyhow::anyhow!("Failed to initialize metrics recorder: {}", e))?;

        Ok(())
    }

    /// Record rows written to a landed file and rows discarded as empty
    pub fn record_fetch(&self, prefix: &str, written: usize, dropped: usize) {
        counter!(self.rows_fetched_total, "prefix" => prefix.to_owned()).increment(written as u64);
        counter!(self.rows_dropped_total, "prefix" => prefix.to_owned()).increment(dropped as u64);
    }

    /// Record rows bulk-copied into a table
    pub fn record_load(&self, table: &str, rows: u64) {
        counter!(self.rows_loaded_total, "table" => table.to_owned()).increment(rows);
    }

    /// Record a finished stage
    pub fn record_stage(&self, stage: &str, duration: Duration, success: bool) {
        let status = if success { "success" } else { "error" };

        counter!(self.stage_runs_total, "stage" => stage.to_owned(), "status" => status).increment(1);
        histogram!(self.stage_duration, "stage" => stage.to_owned()).record(duration.as_secs_f64());

        if !success {
            counter!(self.errors_total, "stage" => stage.to_owned()).increment(1);
        }
    }

    /// Record the size of the dataset a report was computed from
    pub fn record_report_rows(&self, rows: usize) {
        gauge!(self.report_rows).set(rows as f64);
    }
}
