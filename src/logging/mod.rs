//! Logging and observability
//!
//! Structured logging via `tracing`, with a JSON file layer and a set of
//! macros that keep the field names of pipeline events consistent
//! (`batch`, `stage`, `status`, `file`).
//!
//! # Example
//!
//! ```no_run
//! use batchfeed::logging::init_logging;
//! use batchfeed::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(batch = "RISK_BATCH_20250101120000_1", "Batch created");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log the start of a pipeline stage
///
/// # Example
///
/// ```no_run
/// use batchfeed::log_stage_start;
///
/// log_stage_start!("2475_RC_DELTA_20250101120000_1", "archive");
/// ```
#[macro_export]
macro_rules! log_stage_start {
    ($batch:expr, $stage:expr) => {
        tracing::info!(
            batch = %$batch,
            stage = %$stage,
            "Stage started"
        );
    };
}

/// Log the completion of a pipeline stage with the persisted status
///
/// # Example
///
/// ```no_run
/// use batchfeed::log_stage_complete;
/// use batchfeed::domain::BatchStatus;
///
/// log_stage_complete!("2475_RC_DELTA_20250101120000_1", "archive", BatchStatus::Archived);
/// ```
#[macro_export]
macro_rules! log_stage_complete {
    ($batch:expr, $stage:expr, $status:expr) => {
        tracing::info!(
            batch = %$batch,
            stage = %$stage,
            status = %$status,
            "Stage completed"
        );
    };
}

/// Log how a reply file was handled
///
/// # Example
///
/// ```no_run
/// use batchfeed::log_reply_outcome;
///
/// log_reply_outcome!("BATCH_001.zip.enc", "applied");
/// ```
#[macro_export]
macro_rules! log_reply_outcome {
    ($file:expr, $outcome:expr) => {
        tracing::info!(
            file = %$file,
            outcome = %$outcome,
            "Reply handled"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use batchfeed::log_error_with_context;
/// use batchfeed::domain::BatchfeedError;
///
/// let error = BatchfeedError::Transport("connection refused".to_string());
/// log_error_with_context!(&error, "Upload failed");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        )
    };
}
