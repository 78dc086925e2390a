//! Stage ordering of a full pipeline run

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;
use whatsapp_etl::config::{AppConfig, TransformConfig};
use whatsapp_etl::fetch::{Fetcher, SheetSource};
use whatsapp_etl::load::Loader;
use whatsapp_etl::transform::DbtRunner;
use whatsapp_etl::{Pipeline, PipelineError, Result};

/// Serves fixed CSV bodies and counts requests
struct StaticSource {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SheetSource for StaticSource {
    async fn fetch_csv(&self, url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if url.contains("messages") {
            Ok("id,direction\n1,outbound\n".to_string())
        } else {
            Ok("id,status\n1,read\n".to_string())
        }
    }
}

struct FailingSource;

#[async_trait]
impl SheetSource for FailingSource {
    async fn fetch_csv(&self, url: &str) -> Result<String> {
        Err(PipelineError::HttpStatus {
            url: url.to_string(),
            status: 503,
        })
    }
}

fn config(raw_dir: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.fetch.raw_dir = raw_dir.display().to_string();
    config.fetch.messages_url = "http://sheets.test/messages.csv".to_string();
    config.fetch.statuses_url = "http://sheets.test/statuses.csv".to_string();
    config.database.connect_timeout_secs = 2;
    config
}

/// Running this would fail with an I/O error; seeing any other error proves
/// transform never started
fn missing_dbt(dir: &std::path::Path) -> DbtRunner {
    DbtRunner::new(&TransformConfig {
        dbt_executable: "whatsapp-etl-no-such-dbt".to_string(),
        project_dir: dir.display().to_string(),
        profiles_dir: dir.display().to_string(),
    })
}

#[tokio::test]
async fn test_failed_load_prevents_transform() {
    let dir = tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let config = config(dir.path());

    let pipeline = Pipeline::new(
        Fetcher::new(StaticSource { calls: calls.clone() }, config.clone()),
        // Nothing listens on port 1
        Loader::new(config, "postgresql://etl@127.0.0.1:1/none".to_string()),
        missing_dbt(dir.path()),
    );

    let err = pipeline.run().await.unwrap_err();
    assert!(matches!(err, PipelineError::Database(_)), "unexpected error: {err}");
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // Both exports were landed before the load failed
    let landed: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tsv"))
        .collect();
    assert_eq!(landed.len(), 2);
}

#[tokio::test]
async fn test_failed_fetch_prevents_load() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());

    let pipeline = Pipeline::new(
        Fetcher::new(FailingSource, config.clone()),
        Loader::new(config, "postgresql://etl@127.0.0.1:1/none".to_string()),
        missing_dbt(dir.path()),
    );

    let err = pipeline.run().await.unwrap_err();
    assert!(matches!(err, PipelineError::HttpStatus { status: 503, .. }));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_transform_alone_reports_missing_dbt() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());

    let pipeline = Pipeline::new(
        Fetcher::new(FailingSource, config.clone()),
        Loader::from_config(&config),
        missing_dbt(dir.path()),
    );

    let err = pipeline.transform().await.unwrap_err();
    assert!(matches!(err, PipelineError::Io(_)));
}
