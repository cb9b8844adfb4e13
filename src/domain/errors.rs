//! Domain error types
//!
//! This module defines the error hierarchy for Batchfeed. Errors are grouped by
//! how the caller is expected to react: configuration problems abort a stage,
//! transport problems leave the batch where it is for a manual retry, and
//! integrity problems discard the offending reply file.

use thiserror::Error;

/// Main Batchfeed error type
///
/// This is the primary error type used throughout the application.
#[derive(Debug, Error)]
pub enum BatchfeedError {
    /// Missing or invalid configuration, key material or mapping rules
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Remote endpoint unreachable, authentication refused, remote I/O failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Checksum mismatch or tampered content
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Archive entry resolving outside of the extraction directory
    #[error("Path traversal rejected: {0}")]
    PathTraversal(String),

    /// Envelope encryption/decryption errors
    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// A batch run with the same name already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A batch, artifact or record that was asked for does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// A pipeline stage failed; carries enough context to resume
    #[error("Stage '{stage}' failed for batch {batch}: {source}")]
    Stage {
        batch: String,
        stage: String,
        #[source]
        source: Box<BatchfeedError>,
    },

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl BatchfeedError {
    /// Wraps an error with the batch and stage it happened in
    pub fn in_stage(self, batch: impl Into<String>, stage: impl Into<String>) -> Self {
        match self {
            // Never nest stage context twice
            err @ BatchfeedError::Stage { .. } => err,
            other => BatchfeedError::Stage {
                batch: batch.into(),
                stage: stage.into(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, looking through stage context
    pub fn root(&self) -> &BatchfeedError {
        match self {
            BatchfeedError::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// True for failures that mean the content cannot be trusted
    ///
    /// Envelope authentication failures and malformed envelopes count as
    /// integrity failures alongside explicit checksum mismatches.
    pub fn is_integrity(&self) -> bool {
        match self.root() {
            BatchfeedError::Integrity(_) => true,
            BatchfeedError::Envelope(e) => e.is_integrity_failure(),
            _ => false,
        }
    }

    /// True for rejected archive entries
    pub fn is_path_traversal(&self) -> bool {
        matches!(self.root(), BatchfeedError::PathTraversal(_))
    }

    /// True for transport failures
    pub fn is_transport(&self) -> bool {
        matches!(self.root(), BatchfeedError::Transport(_))
    }

    /// True for configuration failures, including unusable key material
    pub fn is_configuration(&self) -> bool {
        match self.root() {
            BatchfeedError::Configuration(_) => true,
            BatchfeedError::Envelope(e) => {
                matches!(e, EnvelopeError::Passphrase | EnvelopeError::Key(_))
            }
            _ => false,
        }
    }
}

/// Envelope-specific errors
///
/// Errors raised while sealing or opening an envelope, or while reading key
/// files. These errors don't expose third-party crypto types.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The integrity tag did not verify
    #[error("Authentication failed: envelope was modified or is corrupt")]
    Authentication,

    /// None of the session keys in the envelope belong to the supplied keyring
    #[error("Secret key for message not found (recipients: {0})")]
    KeyNotFound(String),

    /// The inner payload is not literal data
    #[error("Unsupported payload: {0}")]
    UnsupportedPayload(String),

    /// Armor or binary structure could not be parsed
    #[error("Malformed envelope: {0}")]
    Malformed(String),

    /// The passphrase did not unlock the secret key
    #[error("Passphrase does not unlock the secret key")]
    Passphrase,

    /// Key file unreadable or key material invalid
    #[error("Invalid key material: {0}")]
    Key(String),
}

impl EnvelopeError {
    /// True when the error should be treated as tampered content
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            EnvelopeError::Authentication | EnvelopeError::Malformed(_)
        )
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for BatchfeedError {
    fn from(err: std::io::Error) -> Self {
        BatchfeedError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for BatchfeedError {
    fn from(err: serde_json::Error) -> Self {
        BatchfeedError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for BatchfeedError {
    fn from(err: toml::de::Error) -> Self {
        BatchfeedError::Configuration(format!("TOML parse error: {err}"))
    }
}

// Conversion from XML reader/writer errors
impl From<quick_xml::Error> for BatchfeedError {
    fn from(err: quick_xml::Error) -> Self {
        BatchfeedError::Serialization(format!("XML error: {err}"))
    }
}
