//! Configurable field mapping
//!
//! - [`document`] - the nested output document tree
//! - [`engine`] - source field resolution and target path dispatch

pub mod document;
pub mod engine;

pub use document::Node;
pub use engine::{source_fields, MappingEngine};
