//! Outbound pipeline and per-batch workspaces

#[allow(clippy::module_inception)]
pub mod pipeline;
pub mod workspace;

pub use pipeline::{BatchPipeline, Stage};
pub use workspace::{Artifact, BatchWorkspace, Workspace};
