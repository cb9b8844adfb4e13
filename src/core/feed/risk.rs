//! Risk feed: JSON Lines, one client risk rating request per record, plus a
//! control manifest describing the archive

use crate::config::RiskFeedConfig;
use crate::core::codec::checksum::sha256_hex;
use crate::core::feed::strategy::{FeedDocument, FeedStrategy};
use crate::core::mapping::Node;
use crate::domain::{BatchName, FeedKind, InputRecord, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Contents of `control.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlManifest {
    pub request_filename: String,
    pub total_no_of_requests: usize,
    pub check_sum: String,
    pub request_time_stamp: String,
    pub caller_system: String,
    pub mode: String,
    pub process_type: String,
}

/// Risk feed format
#[derive(Debug, Clone)]
pub struct RiskFeed {
    config: RiskFeedConfig,
}

impl RiskFeed {
    pub fn new(config: RiskFeedConfig) -> Self {
        Self { config }
    }

    pub fn manifest(
        &self,
        archive_name: &str,
        archive: &[u8],
        record_count: usize,
        now: DateTime<Utc>,
    ) -> ControlManifest {
        ControlManifest {
            request_filename: archive_name.to_string(),
            total_no_of_requests: record_count,
            check_sum: sha256_hex(archive),
            request_time_stamp: timestamp(now),
            caller_system: self.config.control_caller_system.clone(),
            mode: self.config.mode.clone(),
            process_type: self.config.process_type.clone(),
        }
    }
}

fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn empty_object() -> Node {
    Node::group(Vec::<(String, Node)>::new())
}

impl FeedStrategy for RiskFeed {
    fn kind(&self) -> FeedKind {
        FeedKind::Risk
    }

    fn batch_prefix(&self) -> &str {
        &self.config.batch_prefix
    }

    fn extension(&self) -> &'static str {
        "jsonl"
    }

    /// Risk lines carry their own header, so the batch header stays empty
    fn header(&self, _batch: &BatchName, _record_count: usize, _now: DateTime<Utc>) -> Node {
        empty_object()
    }

    fn record_skeleton(&self, record: &InputRecord, now: DateTime<Utc>) -> Node {
        let client = record
            .client_id
            .map_or_else(|| "unknown".to_string(), |id| id.to_string());

        let header = Node::group([
            ("callerSystem", Node::text(&self.config.caller_system)),
            (
                "requestID",
                Node::text(format!("REQ-{}-{}", now.timestamp_millis(), client)),
            ),
            ("dbBusinessline", Node::text(&self.config.business_line)),
            ("requestTimeStamp", Node::text(timestamp(now))),
            ("crrmVersion", Node::text(&self.config.crrm_version)),
        ]);

        let request = Node::group([
            (
                "clientDetails",
                Node::group([("additionalRule", Node::repeated("rule", empty_object()))]),
            ),
            ("entityRiskType", empty_object()),
            ("industryRiskType", empty_object()),
            (
                "geoRiskType",
                Node::group([("addressType", empty_object())]),
            ),
            ("productRiskType", Node::repeated("product", empty_object())),
            ("channelRiskType", empty_object()),
        ]);

        let mut requests = Node::repeated("request", request.clone());
        requests.push_item(request);

        Node::group([("header", header), ("clientRiskRatingRequest", requests)])
    }

    fn serialize(&self, document: &FeedDocument) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for record in &document.records {
            serde_json::to_writer(&mut out, record)?;
            out.push(b'\n');
        }
        Ok(out)
    }

    fn render_record(&self, record: &Node) -> Result<String> {
        Ok(serde_json::to_string_pretty(record)?)
    }

    fn control_manifest(
        &self,
        archive_name: &str,
        archive: &[u8],
        record_count: usize,
        now: DateTime<Utc>,
    ) -> Result<Option<Vec<u8>>> {
        let manifest = self.manifest(archive_name, archive, record_count, now);
        Ok(Some(serde_json::to_vec_pretty(&manifest)?))
    }
}
