//! Persistence abstraction for batch runs and their reply rows
//!
//! This module defines the trait that storage backends implement so the
//! pipeline and the reply processor never depend on a concrete database.

use crate::domain::{
    BatchFeedbackResult, BatchName, BatchRun, BatchRunError, BatchStatus, FeedKind, MappingRule,
    ReplyEffect, Result,
};
use async_trait::async_trait;

/// Storage for batch runs, reply detail rows and mapping rule sets
#[async_trait]
pub trait BatchRepository: Send + Sync {
    /// Create tables and indexes if they are missing
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    async fn ensure_schema(&self) -> Result<()>;

    /// Insert a new batch run in status `CREATED`
    ///
    /// # Errors
    ///
    /// Returns a validation error if the name is already taken.
    async fn create_batch_run(&self, name: &BatchName, feed: FeedKind) -> Result<BatchRun>;

    async fn find_by_name(&self, name: &str) -> Result<Option<BatchRun>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<BatchRun>>;

    /// All batch runs, newest first
    async fn find_all(&self) -> Result<Vec<BatchRun>>;

    /// Set the status of a batch run and bump `updated_at`
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::BatchfeedError::NotFound`] for an unknown id.
    async fn update_status(&self, id: i64, status: BatchStatus) -> Result<BatchRun>;

    /// Apply a parsed reply as one atomic unit
    ///
    /// Either the status, the summary column and every detail row are
    /// stored, or nothing is.
    async fn apply_reply(&self, id: i64, effect: &ReplyEffect) -> Result<BatchRun>;

    async fn errors_for(&self, id: i64) -> Result<Vec<BatchRunError>>;

    async fn feedback_for(&self, id: i64) -> Result<Vec<BatchFeedbackResult>>;

    /// Mapping rules of a feed kind, in declaration order
    async fn load_mapping_rules(&self, kind: FeedKind) -> Result<Vec<MappingRule>>;

    /// Replace the whole rule set of a feed kind
    async fn replace_mapping_rules(&self, kind: FeedKind, rules: &[MappingRule]) -> Result<()>;

    /// Backend name for logs
    fn backend_name(&self) -> &'static str;
}
