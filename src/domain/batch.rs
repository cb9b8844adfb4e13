//! Batch run life-cycle model
//!
//! A [`BatchRun`] is the persisted record of one outbound submission. Its
//! status moves forward once per pipeline stage and then once more when the
//! vendor replies.

use crate::domain::ids::BatchName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Feed types served by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    /// Name screening feed (XML with per-record structural checksums)
    Screening,
    /// Client risk rating feed (JSON Lines with a control manifest)
    Risk,
}

impl FeedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedKind::Screening => "screening",
            FeedKind::Risk => "risk",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "screening" => Ok(FeedKind::Screening),
            "risk" => Ok(FeedKind::Risk),
            other => Err(format!(
                "Unknown feed kind '{other}'. Must be one of: screening, risk"
            )),
        }
    }
}

/// Batch run status
///
/// The outbound states are linear, in declaration order. The two reply states
/// follow `Uploaded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    #[serde(alias = "INITIATED")]
    Created,
    FeedGenerated,
    ChecksumGenerated,
    Archived,
    Encrypted,
    Uploaded,
    NotificationReceived,
    Processed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Created => "CREATED",
            BatchStatus::FeedGenerated => "FEED_GENERATED",
            BatchStatus::ChecksumGenerated => "CHECKSUM_GENERATED",
            BatchStatus::Archived => "ARCHIVED",
            BatchStatus::Encrypted => "ENCRYPTED",
            BatchStatus::Uploaded => "UPLOADED",
            BatchStatus::NotificationReceived => "NOTIFICATION_RECEIVED",
            BatchStatus::Processed => "PROCESSED",
        }
    }

    /// True once the vendor has replied to the batch
    pub fn is_acknowledged(&self) -> bool {
        matches!(
            self,
            BatchStatus::NotificationReceived | BatchStatus::Processed
        )
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" | "INITIATED" => Ok(BatchStatus::Created),
            "FEED_GENERATED" => Ok(BatchStatus::FeedGenerated),
            "CHECKSUM_GENERATED" => Ok(BatchStatus::ChecksumGenerated),
            "ARCHIVED" => Ok(BatchStatus::Archived),
            "ENCRYPTED" => Ok(BatchStatus::Encrypted),
            "UPLOADED" => Ok(BatchStatus::Uploaded),
            "NOTIFICATION_RECEIVED" => Ok(BatchStatus::NotificationReceived),
            "PROCESSED" => Ok(BatchStatus::Processed),
            other => Err(format!("Unknown batch status '{other}'")),
        }
    }
}

/// Persisted life-cycle record for one outbound submission attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRun {
    pub id: i64,
    pub name: BatchName,
    pub feed: FeedKind,
    pub status: BatchStatus,
    /// Vendor status code from the last notification reply
    pub notification_status: Option<String>,
    /// Record count from the last feedback reply
    pub feedback_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-record error reported by a notification reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRunError {
    pub id: i64,
    pub batch_id: i64,
    pub record_id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

/// Per-record match reported by a feedback reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFeedbackResult {
    pub id: i64,
    pub batch_id: i64,
    pub record_id: Option<String>,
    pub match_id: Option<String>,
    pub match_name: Option<String>,
    pub match_score: Option<String>,
    pub status: Option<String>,
}

/// A record error before it has been assigned a row id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordError {
    pub record_id: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
}

/// A match result before it has been assigned a row id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub record_id: Option<String>,
    pub match_id: Option<String>,
    pub match_name: Option<String>,
    pub score: Option<String>,
    pub status: Option<String>,
}

/// Everything a single reply changes, applied as one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyEffect {
    Notification {
        vendor_status: Option<String>,
        errors: Vec<RecordError>,
    },
    Feedback {
        record_count: i32,
        results: Vec<MatchResult>,
    },
}

impl ReplyEffect {
    /// Status the batch moves to when this effect is applied
    pub fn target_status(&self) -> BatchStatus {
        match self {
            ReplyEffect::Notification { .. } => BatchStatus::NotificationReceived,
            ReplyEffect::Feedback { .. } => BatchStatus::Processed,
        }
    }

    /// Number of detail rows the effect inserts
    pub fn row_count(&self) -> usize {
        match self {
            ReplyEffect::Notification { errors, .. } => errors.len(),
            ReplyEffect::Feedback { results, .. } => results.len(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ReplyEffect::Notification { .. } => "notification",
            ReplyEffect::Feedback { .. } => "feedback",
        }
    }
}
