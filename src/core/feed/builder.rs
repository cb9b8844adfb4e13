//! Feed assembly: skeleton, mapping, then per-record finishing

use crate::core::feed::strategy::{FeedDocument, FeedStrategy};
use crate::core::mapping::{MappingEngine, Node};
use crate::domain::{BatchName, InputRecord, MappingRule, Result};
use chrono::{DateTime, Utc};

/// Builds feed documents for one strategy and rule set
pub struct FeedBuilder<'a> {
    strategy: &'a dyn FeedStrategy,
    engine: MappingEngine,
    rules: &'a [MappingRule],
}

impl<'a> FeedBuilder<'a> {
    /// Creates a builder after validating `rules` for the strategy's feed kind
    ///
    /// # Errors
    ///
    /// Returns a configuration error for malformed target paths or unknown
    /// source fields.
    pub fn new(strategy: &'a dyn FeedStrategy, rules: &'a [MappingRule]) -> Result<Self> {
        let engine = MappingEngine::for_feed(strategy.kind());
        engine.validate(rules)?;
        Ok(Self {
            strategy,
            engine,
            rules,
        })
    }

    /// Builds the header and one record document per input record, in input order
    pub fn build(
        &self,
        batch: &BatchName,
        records: &[InputRecord],
        now: DateTime<Utc>,
    ) -> Result<FeedDocument> {
        let header = self.strategy.header(batch, records.len(), now);
        let records = records
            .iter()
            .map(|record| self.build_record(record, now))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            batch = %batch,
            feed = %self.strategy.kind(),
            records = records.len(),
            rules = self.rules.len(),
            "Feed document built"
        );
        Ok(FeedDocument { header, records })
    }

    /// Builds the document for a single record
    pub fn build_record(&self, record: &InputRecord, now: DateTime<Utc>) -> Result<Node> {
        let mut document = self.strategy.record_skeleton(record, now);
        self.engine.apply_all(&mut document, record, self.rules);
        self.strategy.finish_record(&mut document)?;
        Ok(document)
    }

    /// Renders one record the way it would appear in a feed, without creating a batch
    pub fn preview(&self, record: &InputRecord, now: DateTime<Utc>) -> Result<String> {
        let document = self.build_record(record, now)?;
        self.strategy.render_record(&document)
    }
}
