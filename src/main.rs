use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dotenvy::dotenv;
use tracing::info;

use whatsapp_etl::config::AppConfig;
use whatsapp_etl::fetch::HttpSheetSource;
use whatsapp_etl::logging::init_logging;
use whatsapp_etl::metrics::PipelineMetrics;
use whatsapp_etl::models::Dataset;
use whatsapp_etl::pipeline::Pipeline;
use whatsapp_etl::report::{self, ReportKind, ReportOutput};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download both spreadsheet exports and land them as dated TSV files
    Fetch,
    /// Replace database tables with the latest landed files
    Load {
        /// Which table to load
        #[arg(value_enum, default_value = "all")]
        target: LoadTarget,
    },
    /// Run dbt deps and dbt build against the loaded tables
    Transform,
    /// Fetch, load both tables, then transform
    Run,
    /// Render reports from the transformed view
    Report {
        /// Which report to render
        #[arg(value_enum, default_value = "all")]
        report: ReportChoice,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LoadTarget {
    Messages,
    Statuses,
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportChoice {
    UserTrends,
    ReadFraction,
    TimeToRead,
    Statuses,
    All,
}

impl ReportChoice {
    fn kinds(self) -> Vec<ReportKind> {
        match self {
            Self::UserTrends => vec![ReportKind::UserTrends],
            Self::ReadFraction => vec![ReportKind::ReadFraction],
            Self::TimeToRead => vec![ReportKind::TimeToRead],
            Self::Statuses => vec![ReportKind::Statuses],
            Self::All => ReportKind::ALL.to_vec(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging; the guard flushes the log file on exit
    let log_file = config.logging.file_path.as_ref().map(PathBuf::from);
    let _log_guard = init_logging(
        Some(&config.get_log_level()),
        log_file.as_deref(),
        config.logging.format == "json",
    )?;
    PipelineMetrics::init()?;

    info!("Starting whatsapp-etl");

    // Parse command line arguments
    let cli = Cli::parse();
    run_command(cli.command, &config).await
}

/// Pipeline stages from configuration; only the stage commands need one
fn pipeline(config: &AppConfig) -> Result<Pipeline<HttpSheetSource>> {
    Pipeline::from_config(config).context("Failed to set up pipeline")
}

async fn run_command(command: Commands, config: &AppConfig) -> Result<()> {
    match command {
        Commands::Fetch => {
            let paths = pipeline(config)?.fetch().await.context("Fetch failed")?;
            for path in paths {
                info!("Landed {}", path.display());
            }
        },
        Commands::Load { target } => load(&pipeline(config)?, target).await?,
        Commands::Transform => pipeline(config)?.transform().await.context("Transform failed")?,
        Commands::Run => {
            let summary = pipeline(config)?.run().await.context("Pipeline run failed")?;
            for load in &summary.loads {
                info!("{}: {} rows from {}", load.table, load.rows, load.file.display());
            }
        },
        Commands::Report { report: choice } => {
            let outputs = report::run_reports(config, &choice.kinds())
                .await
                .context("Report failed")?;
            print_outputs(&outputs);
        },
    }

    Ok(())
}

/// Load one or both tables
async fn load(pipeline: &Pipeline<HttpSheetSource>, target: LoadTarget) -> Result<()> {
    let dataset = match target {
        LoadTarget::Messages => Dataset::Messages,
        LoadTarget::Statuses => Dataset::Statuses,
        LoadTarget::All => {
            pipeline.load_all().await.context("Load failed")?;
            return Ok(());
        },
    };

    pipeline
        .load_one(dataset)
        .await
        .with_context(|| format!("Loading {dataset} failed"))?;
    Ok(())
}

/// Report text goes to stdout; charts are announced there too
#[allow(clippy::print_stdout)]
fn print_outputs(outputs: &[ReportOutput]) {
    for output in outputs {
        println!("{output}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unusable_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.fetch.messages_url = "not a url".to_string();
        // Nothing listens on port 1
        config.database.url = "postgresql://etl@127.0.0.1:1/none".to_string();
        config.database.connect_timeout_secs = 2;
        config
    }

    #[tokio::test]
    async fn test_report_does_not_set_up_pipeline() {
        let command = Commands::Report {
            report: ReportChoice::ReadFraction,
        };
        let err = run_command(command, &unusable_config()).await.unwrap_err();
        assert_eq!(err.to_string(), "Report failed");
    }

    #[tokio::test]
    async fn test_fetch_sets_up_pipeline() {
        let err = run_command(Commands::Fetch, &unusable_config()).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to set up pipeline");
    }
}
