//! Feed formats and feed assembly
//!
//! The pipeline is written once against [`FeedStrategy`]; the two formats
//! differ only in their document skeleton and serialization:
//!
//! - [`screening`] - NLS XML with a structural checksum per record
//! - [`risk`] - JSON Lines plus a `control.json` manifest

pub mod builder;
pub mod risk;
pub mod screening;
pub mod strategy;

pub use builder::FeedBuilder;
pub use risk::{ControlManifest, RiskFeed};
pub use screening::ScreeningFeed;
pub use strategy::{FeedDocument, FeedStrategy};

use crate::config::FeedsConfig;
use crate::domain::FeedKind;
use std::sync::Arc;

/// Strategy for a feed kind, configured from the `feeds` section
pub fn strategy_for(kind: FeedKind, feeds: &FeedsConfig) -> Arc<dyn FeedStrategy> {
    match kind {
        FeedKind::Screening => Arc::new(ScreeningFeed::new(feeds.screening.clone())),
        FeedKind::Risk => Arc::new(RiskFeed::new(feeds.risk.clone())),
    }
}
