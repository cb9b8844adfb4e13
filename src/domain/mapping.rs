//! Field mapping rules
//!
//! A rule says where in the output document a value goes and where the value
//! comes from. Rule sets are owned per feed kind and are always replaced as a
//! whole.

use serde::{Deserialize, Serialize};

/// One configured mapping from an input field (or a literal) to a document path
///
/// # Examples
///
/// ```
/// use batchfeed::domain::mapping::MappingRule;
///
/// let rule = MappingRule::from_source("name.full", "lastName");
/// assert_eq!(rule.target_path, "name.full");
/// assert_eq!(rule.source_field.as_deref(), Some("lastName"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingRule {
    /// Dotted path into the output document, `section.field` or `section.sub.field`
    pub target_path: String,

    /// Accessor name on the input record
    #[serde(default)]
    pub source_field: Option<String>,

    /// Literal used when the source resolves to nothing
    #[serde(default)]
    pub default_value: Option<String>,

    /// Advisory grouping, not interpreted
    #[serde(default)]
    pub category: Option<String>,
}

impl MappingRule {
    /// Rule that copies an input field
    pub fn from_source(target_path: impl Into<String>, source_field: impl Into<String>) -> Self {
        Self {
            target_path: target_path.into(),
            source_field: Some(source_field.into()),
            default_value: None,
            category: None,
        }
    }

    /// Rule that always writes a literal
    pub fn constant(target_path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            target_path: target_path.into(),
            source_field: None,
            default_value: Some(value.into()),
            category: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}
