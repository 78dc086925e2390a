//! Fetch stage: download the published spreadsheet exports and land them.

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, instrument};

use crate::config::AppConfig;
use crate::error::{PipelineError, Result};
use crate::landing::land_csv;
use crate::metrics::PipelineMetrics;
use crate::models::{Dataset, LandedFile};
use crate::validation::InputValidator;

/// Where CSV exports come from
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// Download one export as CSV text
    async fn fetch_csv(&self, url: &str) -> Result<String>;
}

/// Published Google Sheets exports over HTTP
pub struct HttpSheetSource {
    client: Client,
}

impl HttpSheetSource {
    /// HTTP client with a whole-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SheetSource for HttpSheetSource {
    async fn fetch_csv(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

/// Downloads both exports and lands them in the raw directory
pub struct Fetcher<S: SheetSource> {
    source: S,
    config: AppConfig,
    metrics: PipelineMetrics,
}

impl Fetcher<HttpSheetSource> {
    /// Fetcher backed by HTTP with the configured timeout
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        for dataset in Dataset::ALL {
            InputValidator::validate_export_url(dataset.url(config))?;
        }
        let source = HttpSheetSource::new(config.request_timeout())?;
        Ok(Self::new(source, config.clone()))
    }
}

impl<S: SheetSource> Fetcher<S> {
    /// Fetcher over any export source
    pub fn new(source: S, config: AppConfig) -> Self {
        Self {
            source,
            config,
            metrics: PipelineMetrics::default(),
        }
    }

    /// Download one dataset and land it stamped with `date`
    #[instrument(skip(self))]
    pub async fn fetch_dataset(&self, dataset: Dataset, date: NaiveDate) -> Result<LandedFile> {
        let prefix = dataset.prefix(&self.config);
        info!("Downloading {}...", prefix);

        let csv_text = self.source.fetch_csv(dataset.url(&self.config)).await?;
        let landed = land_csv(&csv_text, prefix, &self.config.raw_dir(), date)?;

        self.metrics.record_fetch(prefix, landed.rows, landed.dropped);
        info!("SUCCESS: {} rows -> {}", landed.rows, landed.path.display());
        Ok(landed)
    }

    /// Download messages then statuses, stamped with today's local date
    pub async fn fetch_all(&self) -> Result<Vec<PathBuf>> {
        let today = Local::now().date_naive();
        let mut paths = Vec::with_capacity(Dataset::ALL.len());
        for dataset in Dataset::ALL {
            paths.push(self.fetch_dataset(dataset, today).await?.path);
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use tempfile::tempdir;

    fn config_in(dir: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.fetch.raw_dir = dir.display().to_string();
        config.fetch.messages_url = "http://sheets.test/messages.csv".to_string();
        config.fetch.statuses_url = "http://sheets.test/statuses.csv".to_string();
        config
    }

    #[tokio::test]
    async fn test_fetch_dataset_lands_tsv() {
        let dir = tempdir().unwrap();
        let mut source = MockSheetSource::new();
        source
            .expect_fetch_csv()
            .with(eq("http://sheets.test/statuses.csv"))
            .times(1)
            .returning(|_| Ok("id,status\n1,read\n,\n".to_string()));

        let fetcher = Fetcher::new(source, config_in(dir.path()));
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let landed = fetcher.fetch_dataset(Dataset::Statuses, date).await.unwrap();

        assert_eq!(landed.rows, 1);
        assert_eq!(landed.path, dir.path().join("whatsapp_statuses_20250601.tsv"));
    }

    #[test]
    fn test_from_config_rejects_bad_export_url() {
        let mut config = AppConfig::default();
        config.fetch.statuses_url = "sheets.test/statuses.csv".to_string();
        assert!(matches!(
            Fetcher::from_config(&config),
            Err(PipelineError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_all_stops_on_first_error() {
        let dir = tempdir().unwrap();
        let mut source = MockSheetSource::new();
        source.expect_fetch_csv().times(1).returning(|url| {
            Err(PipelineError::HttpStatus {
                url: url.to_string(),
                status: 500,
            })
        });

        let fetcher = Fetcher::new(source, config_in(dir.path()));
        let err = fetcher.fetch_all().await.unwrap_err();
        assert!(matches!(err, PipelineError::HttpStatus { status: 500, .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
