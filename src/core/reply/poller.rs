//! Fixed-interval inbox poller

use crate::config::PollerConfig;
use crate::core::reply::processor::{ReplyOutcome, ReplyProcessor};
use crate::domain::{BatchfeedError, Result};
use crate::log_error_with_context;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

/// Counters for one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub listed: usize,
    pub applied: usize,
    pub uncorrelated: usize,
    pub ignored: usize,
    pub discarded: usize,
    pub failed: usize,
}

impl PollSummary {
    pub fn processed(&self) -> usize {
        self.applied + self.uncorrelated + self.ignored
    }

    pub fn log_summary(&self) {
        if self.listed == 0 {
            tracing::debug!("Inbox empty");
            return;
        }
        tracing::info!(
            listed = self.listed,
            applied = self.applied,
            uncorrelated = self.uncorrelated,
            ignored = self.ignored,
            discarded = self.discarded,
            failed = self.failed,
            "Poll cycle completed"
        );
    }
}

pub struct ReplyPoller {
    processor: Arc<ReplyProcessor>,
    interval: Duration,
    max_concurrent: usize,
    seen: Mutex<HashSet<String>>,
}

impl ReplyPoller {
    pub fn new(processor: Arc<ReplyProcessor>, config: &PollerConfig) -> Self {
        Self {
            processor,
            interval: Duration::from_secs(config.interval_seconds),
            max_concurrent: config.max_concurrent.max(1),
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Lists the inbox once and processes every new envelope in listing order
    ///
    /// Files are started in listing order with at most `max_concurrent` in
    /// flight. One failing file never stops the others.
    pub async fn poll_once(&self) -> Result<PollSummary> {
        let listed = self.list_inbox().await?;
        let suffix = self.processor.envelope_suffix().to_string();

        let pending: Vec<String> = {
            let mut seen = self.seen.lock().await;
            // Names gone from the inbox are forgotten
            let present: HashSet<&str> = listed.iter().map(String::as_str).collect();
            seen.retain(|name| present.contains(name.as_str()));
            listed
                .iter()
                .filter(|name| name.ends_with(&suffix) && !seen.contains(*name))
                .cloned()
                .collect()
        };

        let mut summary = PollSummary {
            listed: pending.len(),
            ..Default::default()
        };

        let processor = &self.processor;
        let results: Vec<(String, Result<ReplyOutcome>)> = stream::iter(pending)
            .map(|name| async move {
                let result = processor.process(&name).await;
                (name, result)
            })
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let mut seen = self.seen.lock().await;
        for (name, result) in results {
            match result {
                Ok(outcome) => {
                    match outcome {
                        ReplyOutcome::Applied { .. } => summary.applied += 1,
                        ReplyOutcome::Uncorrelated { .. } => summary.uncorrelated += 1,
                        ReplyOutcome::Ignored { .. } => summary.ignored += 1,
                    }
                    seen.insert(name);
                }
                Err(e) if e.is_integrity() || e.is_path_traversal() => {
                    summary.discarded += 1;
                    seen.insert(name);
                }
                // Left for the next cycle
                Err(_) => summary.failed += 1,
            }
        }
        Ok(summary)
    }

    /// Number of inbox names skipped on later cycles
    pub async fn remembered(&self) -> usize {
        self.seen.lock().await.len()
    }

    async fn list_inbox(&self) -> Result<Vec<String>> {
        let gateway = Arc::clone(self.processor.gateway());
        let inbox = self.processor.inbox_dir().to_string();
        tokio::task::spawn_blocking(move || gateway.list(&inbox))
            .await
            .map_err(|e| BatchfeedError::Other(format!("List task failed: {e}")))?
    }

    /// Polls until `shutdown` turns true
    ///
    /// The signal is checked between cycles; a cycle in progress always runs
    /// to completion.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            max_concurrent = self.max_concurrent,
            inbox = %self.processor.inbox_dir(),
            "Reply poller started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.poll_once().await {
                Ok(summary) => summary.log_summary(),
                Err(e) => {
                    log_error_with_context!(&e, "Poll cycle failed");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    // Sender dropped
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Reply poller stopped");
        Ok(())
    }
}
