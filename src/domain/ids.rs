//! Domain identifier types with validation
//!
//! Batch names double as workspace directory names and as the prefix of
//! every remote file name, so they are validated once here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Batch name newtype wrapper
///
/// Format: `<prefix>_<yyyyMMddHHmmss>_<seq>`, for example `2475_RC_DELTA_20250101120000_1`.
///
/// # Examples
///
/// ```
/// use batchfeed::domain::ids::BatchName;
/// use std::str::FromStr;
///
/// let name = BatchName::from_str("2475_RC_DELTA_20250101120000_1").unwrap();
/// assert_eq!(name.as_str(), "2475_RC_DELTA_20250101120000_1");
///
/// assert!(BatchName::from_str("../escape").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BatchName(String);

impl BatchName {
    /// Creates a new BatchName from a string
    ///
    /// Rejects empty names and anything that could not be used as a single
    /// path component.
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("Batch name cannot be empty".to_string());
        }
        if name == "." || name == ".." {
            return Err(format!("Invalid batch name: {name}"));
        }
        if let Some(bad) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(format!(
                "Invalid character '{bad}' in batch name '{name}'. Allowed: A-Z a-z 0-9 _ - ."
            ));
        }
        Ok(Self(name))
    }

    /// Derives a batch name from a prefix, a timestamp and a sequence number
    pub fn derive(prefix: &str, timestamp: DateTime<Utc>, seq: u32) -> Result<Self, String> {
        Self::new(format!(
            "{}_{}_{}",
            prefix,
            timestamp.format("%Y%m%d%H%M%S"),
            seq
        ))
    }

    /// Returns the batch name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for BatchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BatchName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for BatchName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BatchName> for String {
    fn from(name: BatchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BatchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_batch_name_valid() {
        let name = BatchName::new("RISK_BATCH_20250101120000_1").unwrap();
        assert_eq!(name.as_str(), "RISK_BATCH_20250101120000_1");
        assert_eq!(name.to_string(), "RISK_BATCH_20250101120000_1");
    }

    #[test]
    fn test_batch_name_rejects_path_components() {
        assert!(BatchName::new("").is_err());
        assert!(BatchName::new("   ").is_err());
        assert!(BatchName::new("..").is_err());
        assert!(BatchName::new("a/b").is_err());
        assert!(BatchName::new("a\\b").is_err());
        assert!(BatchName::new("batch 1").is_err());
    }

    #[test]
    fn test_batch_name_derive() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let name = BatchName::derive("2475_RC_DELTA", ts, 1).unwrap();
        assert_eq!(name.as_str(), "2475_RC_DELTA_20250102030405_1");
    }

    #[test]
    fn test_batch_name_serde() {
        let name = BatchName::new("BATCH_001").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"BATCH_001\"");

        let back: BatchName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, name);

        assert!(serde_json::from_str::<BatchName>("\"../x\"").is_err());
    }
}
