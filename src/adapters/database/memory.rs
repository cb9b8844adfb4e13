//! In-memory batch repository
//!
//! Backs the `memory` database target, dry runs and tests. All state sits
//! behind one lock, so a reply is applied atomically.

use crate::adapters::database::traits::BatchRepository;
use crate::domain::{
    BatchFeedbackResult, BatchName, BatchRun, BatchRunError, BatchStatus, BatchfeedError,
    FeedKind, MappingRule, ReplyEffect, Result,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    runs: Vec<BatchRun>,
    errors: Vec<BatchRunError>,
    feedback: Vec<BatchFeedbackResult>,
    rules: HashMap<FeedKind, Vec<MappingRule>>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn run_mut(&mut self, id: i64) -> Result<&mut BatchRun> {
        self.runs
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| BatchfeedError::NotFound(format!("Batch run with id {id}")))
    }
}

/// Repository that keeps everything in process memory
#[derive(Debug, Default)]
pub struct InMemoryBatchRepository {
    state: RwLock<State>,
}

impl InMemoryBatchRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BatchRepository for InMemoryBatchRepository {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn create_batch_run(&self, name: &BatchName, feed: FeedKind) -> Result<BatchRun> {
        let mut state = self.state.write().await;
        if state.runs.iter().any(|r| &r.name == name) {
            return Err(BatchfeedError::Conflict(format!(
                "Batch run \'{name}\' already exists"
            )));
        }

        let now = Utc::now();
        let run = BatchRun {
            id: state.next_id(),
            name: name.clone(),
            feed,
            status: BatchStatus::Created,
            notification_status: None,
            feedback_count: 0,
            created_at: now,
            updated_at: now,
        };
        state.runs.push(run.clone());
        Ok(run)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<BatchRun>> {
        let state = self.state.read().await;
        Ok(state.runs.iter().find(|r| r.name.as_str() == name).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<BatchRun>> {
        let state = self.state.read().await;
        Ok(state.runs.iter().find(|r| r.id == id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<BatchRun>> {
        let state = self.state.read().await;
        let mut runs = state.runs.clone();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(runs)
    }

    async fn update_status(&self, id: i64, status: BatchStatus) -> Result<BatchRun> {
        let mut state = self.state.write().await;
        let run = state.run_mut(id)?;
        run.status = status;
        run.updated_at = Utc::now();
        Ok(run.clone())
    }

    async fn apply_reply(&self, id: i64, effect: &ReplyEffect) -> Result<BatchRun> {
        let mut state = self.state.write().await;
        // Fail before touching anything
        state.run_mut(id)?;

        match effect {
            ReplyEffect::Notification { errors, .. } => {
                for error in errors {
                    let row = BatchRunError {
                        id: state.next_id(),
                        batch_id: id,
                        record_id: error.record_id.clone(),
                        error_code: error.code.clone(),
                        error_message: error.message.clone(),
                    };
                    state.errors.push(row);
                }
            }
            ReplyEffect::Feedback { results, .. } => {
                for result in results {
                    let row = BatchFeedbackResult {
                        id: state.next_id(),
                        batch_id: id,
                        record_id: result.record_id.clone(),
                        match_id: result.match_id.clone(),
                        match_name: result.match_name.clone(),
                        match_score: result.score.clone(),
                        status: result.status.clone(),
                    };
                    state.feedback.push(row);
                }
            }
        }

        let run = state.run_mut(id)?;
        run.status = effect.target_status();
        match effect {
            ReplyEffect::Notification { vendor_status, .. } => {
                run.notification_status = vendor_status.clone();
            }
            ReplyEffect::Feedback { record_count, .. } => {
                run.feedback_count = *record_count;
            }
        }
        run.updated_at = Utc::now();
        Ok(run.clone())
    }

    async fn errors_for(&self, id: i64) -> Result<Vec<BatchRunError>> {
        let state = self.state.read().await;
        Ok(state
            .errors
            .iter()
            .filter(|e| e.batch_id == id)
            .cloned()
            .collect())
    }

    async fn feedback_for(&self, id: i64) -> Result<Vec<BatchFeedbackResult>> {
        let state = self.state.read().await;
        Ok(state
            .feedback
            .iter()
            .filter(|f| f.batch_id == id)
            .cloned()
            .collect())
    }

    async fn load_mapping_rules(&self, kind: FeedKind) -> Result<Vec<MappingRule>> {
        let state = self.state.read().await;
        Ok(state.rules.get(&kind).cloned().unwrap_or_default())
    }

    async fn replace_mapping_rules(&self, kind: FeedKind, rules: &[MappingRule]) -> Result<()> {
        let mut state = self.state.write().await;
        state.rules.insert(kind, rules.to_vec());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
