//! Inbound replies: parsing, correlation and polling
//!
//! - [`parser`] - namespace-agnostic reading of Notification and Feedback documents
//! - [`processor`] - one reply file from download to persisted effect
//! - [`poller`] - fixed-interval inbox scan with bounded concurrency
//! - [`locks`] - per-batch-name serialization

pub mod locks;
pub mod parser;
pub mod poller;
pub mod processor;

pub use locks::{BatchGuard, BatchLocks};
pub use parser::{parse_reply, ParsedReply};
pub use poller::{PollSummary, ReplyPoller};
pub use processor::{strip_known_suffix, ReplyOutcome, ReplyProcessor};
