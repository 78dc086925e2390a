//! One pipeline run: fetch, then both loads, then transform.
//!
//! The loads share no data and run concurrently on separate connections.
//! Transform starts only after both finished successfully; the first failure
//! ends the run.

use std::future::Future;
use std::path::PathBuf;

use tracing::{error, info};

use crate::config::AppConfig;
use crate::error::Result;
use crate::fetch::{Fetcher, SheetSource};
use crate::load::Loader;
use crate::logging::OperationTimer;
use crate::metrics::PipelineMetrics;
use crate::models::{Dataset, LoadReport};
use crate::transform::DbtRunner;

/// Everything a successful run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Files written by the fetch stage
    pub landed: Vec<PathBuf>,
    /// One report per loaded table
    pub loads: Vec<LoadReport>,
}

/// Time a stage and record its outcome
pub async fn stage<T, F>(name: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let timer = OperationTimer::new(name);
    let result = fut.await;
    let duration = timer.finish();
    PipelineMetrics::default().record_stage(name, duration, result.is_ok());
    if let Err(e) = &result {
        error!(stage = name, error = %e, "Stage failed");
    }
    result
}

/// Pipeline stages wired from configuration
pub struct Pipeline<S: SheetSource> {
    fetcher: Fetcher<S>,
    loader: Loader,
    dbt: DbtRunner,
}

impl<S: SheetSource> Pipeline<S> {
    /// Pipeline over the given stages
    pub fn new(fetcher: Fetcher<S>, loader: Loader, dbt: DbtRunner) -> Self {
        Self { fetcher, loader, dbt }
    }

    /// Fetch and land both exports
    pub async fn fetch(&self) -> Result<Vec<PathBuf>> {
        stage("fetch", self.fetcher.fetch_all()).await
    }

    /// Load a single table
    pub async fn load_one(&self, dataset: Dataset) -> Result<LoadReport> {
        self.loader.load(dataset).await
    }

    /// Load both tables concurrently
    pub async fn load_all(&self) -> Result<Vec<LoadReport>> {
        let (messages, statuses) = tokio::try_join!(
            self.loader.load(Dataset::Messages),
            self.loader.load(Dataset::Statuses),
        )?;
        Ok(vec![messages, statuses])
    }

    /// Run dbt against the loaded tables
    pub async fn transform(&self) -> Result<()> {
        stage("transform", self.dbt.run()).await
    }

    /// fetch -> {load messages, load statuses} -> transform
    pub async fn run(&self) -> Result<RunSummary> {
        info!("Pipeline run started");
        let landed = self.fetch().await?;
        let loads = self.load_all().await?;
        self.transform().await?;
        info!("Pipeline run finished");
        Ok(RunSummary { landed, loads })
    }
}

impl Pipeline<crate::fetch::HttpSheetSource> {
    /// Pipeline with HTTP fetch, database from configuration and dbt
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            Fetcher::from_config(config)?,
            Loader::from_config(config),
            DbtRunner::new(&config.transform),
        ))
    }
}
