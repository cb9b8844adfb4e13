//! Row models for the PostgreSQL tables
//!
//! Rows are read into these plain structs first and converted to domain types
//! afterwards, so a malformed stored value surfaces as a database error
//! instead of a panic.

use crate::domain::{
    BatchFeedbackResult, BatchName, BatchRun, BatchRunError, BatchStatus, BatchfeedError,
    FeedKind, MappingRule, Result,
};
use chrono::{DateTime, Utc};
use std::str::FromStr;
use tokio_postgres::Row;

/// Row of the `batch_runs` table
#[derive(Debug, Clone)]
pub struct PostgreSQLBatchRun {
    pub id: i64,
    pub name: String,
    pub feed: String,
    pub status: String,
    pub notification_status: Option<String>,
    pub feedback_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PostgreSQLBatchRun {
    pub const COLUMNS: &'static str =
        "id, name, feed, status, notification_status, feedback_count, created_at, updated_at";

    pub fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            name: row.get("name"),
            feed: row.get("feed"),
            status: row.get("status"),
            notification_status: row.get("notification_status"),
            feedback_count: row.get("feedback_count"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    /// Converts to the domain type, validating name, feed and status
    pub fn into_domain(self) -> Result<BatchRun> {
        let name = BatchName::new(self.name)
            .map_err(|e| BatchfeedError::Database(format!("Stored batch name invalid: {e}")))?;
        let feed = FeedKind::from_str(&self.feed)
            .map_err(|e| BatchfeedError::Database(format!("Stored feed kind invalid: {e}")))?;
        let status = BatchStatus::from_str(&self.status)
            .map_err(|e| BatchfeedError::Database(format!("Stored status invalid: {e}")))?;

        Ok(BatchRun {
            id: self.id,
            name,
            feed,
            status,
            notification_status: self.notification_status,
            feedback_count: self.feedback_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub fn batch_run_error_from_row(row: &Row) -> BatchRunError {
    BatchRunError {
        id: row.get("id"),
        batch_id: row.get("batch_id"),
        record_id: row.get("record_id"),
        error_code: row.get("error_code"),
        error_message: row.get("error_message"),
    }
}

pub fn feedback_result_from_row(row: &Row) -> BatchFeedbackResult {
    BatchFeedbackResult {
        id: row.get("id"),
        batch_id: row.get("batch_id"),
        record_id: row.get("record_id"),
        match_id: row.get("match_id"),
        match_name: row.get("match_name"),
        match_score: row.get("match_score"),
        status: row.get("status"),
    }
}

pub fn mapping_rule_from_row(row: &Row) -> MappingRule {
    MappingRule {
        target_path: row.get("target_path"),
        source_field: row.get("source_field"),
        default_value: row.get("default_value"),
        category: row.get("category"),
    }
}
