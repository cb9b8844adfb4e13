//! Domain models and types for Batchfeed.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`BatchName`])
//! - **Domain models** ([`BatchRun`], [`InputRecord`], [`MappingRule`], [`ReplyEffect`])
//! - **Error types** ([`BatchfeedError`], [`EnvelopeError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, BatchfeedError>`]:
//!
//! ```rust
//! use batchfeed::domain::{BatchName, BatchfeedError, Result};
//!
//! fn parse(name: &str) -> Result<BatchName> {
//!     BatchName::new(name).map_err(BatchfeedError::Validation)
//! }
//!
//! assert!(parse("RISK_BATCH_20250101120000_1").is_ok());
//! assert!(parse("../etc").is_err());
//! ```

pub mod batch;
pub mod errors;
pub mod ids;
pub mod mapping;
pub mod record;
pub mod result;

// Re-export commonly used types for convenience
pub use batch::{
    BatchFeedbackResult, BatchRun, BatchRunError, BatchStatus, FeedKind, MatchResult,
    RecordError, ReplyEffect,
};
pub use errors::{BatchfeedError, EnvelopeError};
pub use ids::BatchName;
pub use mapping::MappingRule;
pub use record::InputRecord;
pub use result::Result;
