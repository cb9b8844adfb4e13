//! The seam between the generic pipeline and one feed format

use crate::core::mapping::Node;
use crate::domain::{BatchName, FeedKind, InputRecord, Result};
use chrono::{DateTime, Utc};

/// Everything the pipeline needs to know about one feed format
///
/// The pipeline owns stage sequencing, state and the workspace. A strategy
/// only decides what the documents look like and how they are written.
pub trait FeedStrategy: Send + Sync {
    fn kind(&self) -> FeedKind;

    /// Prefix used when deriving new batch names
    fn batch_prefix(&self) -> &str;

    /// Feed file extension, without the dot
    fn extension(&self) -> &'static str;

    /// Header block shared by all records of a batch
    fn header(&self, batch: &BatchName, record_count: usize, now: DateTime<Utc>) -> Node;

    /// Complete, unmapped document for one record
    fn record_skeleton(&self, record: &InputRecord, now: DateTime<Utc>) -> Node;

    /// Runs after all mapping rules were applied to a record
    fn finish_record(&self, _record: &mut Node) -> Result<()> {
        Ok(())
    }

    /// Serializes a built feed into the feed file's bytes
    fn serialize(&self, document: &FeedDocument) -> Result<Vec<u8>>;

    /// Renders a single record document for preview
    fn render_record(&self, record: &Node) -> Result<String>;

    /// Control manifest shipped next to the encrypted archive, if the format has one
    fn control_manifest(
        &self,
        _archive_name: &str,
        _archive: &[u8],
        _record_count: usize,
        _now: DateTime<Utc>,
    ) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// A built feed, before serialization
#[derive(Debug, Clone, PartialEq)]
pub struct FeedDocument {
    pub header: Node,
    pub records: Vec<Node>,
}

impl FeedDocument {
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}
