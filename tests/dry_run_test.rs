//! Integration tests for dry-run mode
//!
//! These tests verify that `application.dry_run` keeps every stage working
//! against the workspace while nothing reaches the remote endpoint.

use batchfeed::adapters::database::InMemoryBatchRepository;
use batchfeed::adapters::transfer::create_gateway;
use batchfeed::config::{BatchfeedConfig, LocalTransferConfig, TransferBackend};
use batchfeed::core::pipeline::BatchPipeline;
use batchfeed::domain::{BatchStatus, FeedKind, InputRecord};
use std::sync::Arc;
use tempfile::TempDir;

fn dry_run_config(tmp: &TempDir) -> BatchfeedConfig {
    let mut config = BatchfeedConfig::in_memory(tmp.path().join("work"));
    config.application.dry_run = true;
    config.encryption.allow_unencrypted_fallback = true;
    config.transfer.backend = TransferBackend::Local;
    config.transfer.local = Some(LocalTransferConfig {
        root: tmp.path().join("remote"),
    });
    config
}

#[test]
fn test_dry_run_selects_disabled_gateway() {
    let tmp = TempDir::new().unwrap();
    let mut config = dry_run_config(&tmp);
    assert_eq!(create_gateway(&config).unwrap().name(), "disabled");

    config.application.dry_run = false;
    assert_eq!(create_gateway(&config).unwrap().name(), "local");
}

#[tokio::test]
async fn test_dry_run_batch_never_reaches_remote() {
    let tmp = TempDir::new().unwrap();
    let config = dry_run_config(&tmp);
    let pipeline = BatchPipeline::new(
        &config,
        Arc::new(InMemoryBatchRepository::new()),
        create_gateway(&config).unwrap(),
    );

    let records = vec![InputRecord {
        client_id: Some(7),
        last_name: Some("Doe".into()),
        ..Default::default()
    }];
    let run = pipeline.initiate(FeedKind::Risk, &records).await.unwrap();
    assert_eq!(run.status, BatchStatus::Uploaded);

    let ws = pipeline.workspace().batch(&run.name);
    assert!(ws.archive_path().exists());
    assert!(ws.control_path().exists());
    assert!(!tmp.path().join("remote").exists());
}
