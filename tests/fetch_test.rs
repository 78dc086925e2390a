//! HTTP download of spreadsheet exports against a local one-shot server

use std::time::Duration;

use chrono::NaiveDate;
use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use whatsapp_etl::config::AppConfig;
use whatsapp_etl::fetch::{Fetcher, HttpSheetSource, SheetSource};
use whatsapp_etl::models::Dataset;
use whatsapp_etl::PipelineError;

/// Serve a single HTTP response and return the URL to request
async fn serve_once(status_line: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0_u8; 4096];
        let _ = socket.read(&mut request).await;
        let response = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: text/csv\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
    });

    format!("http://{addr}/pub?gid=1&single=true&output=csv")
}

#[tokio::test]
async fn test_http_source_returns_body() {
    let url = serve_once("200 OK", "id,status\n1,read\n").await;
    let source = HttpSheetSource::new(Duration::from_secs(5)).unwrap();

    let body = source.fetch_csv(&url).await.unwrap();
    assert_eq!(body, "id,status\n1,read\n");
}

#[tokio::test]
async fn test_http_source_rejects_error_status() {
    let url = serve_once("404 Not Found", "gone").await;
    let source = HttpSheetSource::new(Duration::from_secs(5)).unwrap();

    let err = source.fetch_csv(&url).await.unwrap_err();
    assert!(matches!(err, PipelineError::HttpStatus { status: 404, .. }));
}

#[tokio::test]
async fn test_fetch_dataset_over_http_lands_non_empty_rows() {
    let dir = tempdir().unwrap();
    let url = serve_once("200 OK", "id,direction\n1,outbound\n,\n2,inbound\n").await;

    let mut config = AppConfig::default();
    config.fetch.raw_dir = dir.path().display().to_string();
    config.fetch.messages_url = url;

    let fetcher = Fetcher::new(HttpSheetSource::new(Duration::from_secs(5)).unwrap(), config);
    let landed = fetcher
        .fetch_dataset(Dataset::Messages, NaiveDate::from_ymd_opt(2025, 5, 1).unwrap())
        .await
        .unwrap();

    assert_eq!(landed.rows, 2);
    assert_eq!(landed.dropped, 1);
    assert_eq!(landed.path, dir.path().join("whatsapp_messages_20250501.tsv"));
}
