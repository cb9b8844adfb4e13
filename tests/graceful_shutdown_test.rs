//! Integration tests for graceful shutdown of the reply poller
//!
//! These tests verify that:
//! - A shutdown signal stops the poll loop between cycles
//! - A dropped sender stops the loop as well
//! - The cycle that is running when the signal arrives completes

use batchfeed::adapters::database::{BatchRepository, InMemoryBatchRepository};
use batchfeed::adapters::transfer::LocalTransferGateway;
use batchfeed::config::{BatchfeedConfig, PollerConfig};
use batchfeed::core::codec::envelope::EnvelopeCodec;
use batchfeed::core::reply::{ReplyPoller, ReplyProcessor};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;

fn poller(
    tmp: &TempDir,
    interval_seconds: u64,
) -> (Arc<ReplyPoller>, Arc<InMemoryBatchRepository>) {
    let config = BatchfeedConfig::in_memory(tmp.path().join("work"));
    let repository = Arc::new(InMemoryBatchRepository::new());
    let processor = ReplyProcessor::with_codec(
        &config,
        repository.clone(),
        Arc::new(LocalTransferGateway::new(tmp.path().join("remote"))),
        EnvelopeCodec::new(vec![], None, None),
    );
    let poller_config = PollerConfig {
        interval_seconds,
        ..Default::default()
    };
    (
        Arc::new(ReplyPoller::new(Arc::new(processor), &poller_config)),
        repository,
    )
}

#[tokio::test]
async fn test_shutdown_signal_stops_poll_loop() {
    let tmp = TempDir::new().unwrap();
    let (poller, _) = poller(&tmp, 3600);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn({
        let poller = Arc::clone(&poller);
        async move { poller.run(shutdown_rx).await }
    });

    // Let the first cycle finish and the loop start sleeping
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown_tx.send(true).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("poller did not stop after the shutdown signal")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_dropped_sender_stops_poll_loop() {
    let tmp = TempDir::new().unwrap();
    let (poller, _) = poller(&tmp, 3600);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move { poller.run(shutdown_rx).await });
    drop(shutdown_tx);

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("poller did not stop after the sender was dropped")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_signal_before_start_skips_polling() {
    let tmp = TempDir::new().unwrap();
    let (poller, repository) = poller(&tmp, 1);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    shutdown_tx.send(true).unwrap();

    poller.run(shutdown_rx).await.unwrap();
    assert!(repository.find_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_shutdown_signal_propagation() {
    let (shutdown_tx, shutdown_rx1) = watch::channel(false);
    let shutdown_rx2 = shutdown_rx1.clone();

    assert!(!*shutdown_rx1.borrow());
    assert!(!*shutdown_rx2.borrow());

    shutdown_tx.send(true).unwrap();

    assert!(*shutdown_rx1.borrow());
    assert!(*shutdown_rx2.borrow());
}
