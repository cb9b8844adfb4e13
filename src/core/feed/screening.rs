//! Screening feed: one NLS XML document per batch, with a structural
//! checksum on every record

use crate::config::ScreeningFeedConfig;
use crate::core::codec::checksum::sha256_hex_upper;
use crate::core::feed::strategy::{FeedDocument, FeedStrategy};
use crate::core::mapping::Node;
use crate::domain::{BatchName, BatchfeedError, FeedKind, InputRecord, Result};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use uuid::Uuid;

pub const NS_FILE_DEFINITION: &str = "http://www.db.com/NLSFileDefinition";
pub const NS_REQUEST: &str = "http://www.db.com/NLSRequest";
pub const NS_PARTY: &str = "http://www.db.com/NLSPartyInformation";

const CREATED_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

const INDIVIDUAL_WIRE_ORDER: &[&str] =
    &["Names", "G", "DOB", "Cntr", "Plc", "Occ", "Nats", "Addrs"];
const NAME_WIRE_ORDER: &[&str] = &["Type", "Tit", "Fir", "Mid", "Sur", "Ma", "Full"];

/// Screening feed format
#[derive(Debug, Clone)]
pub struct ScreeningFeed {
    config: ScreeningFeedConfig,
}

impl ScreeningFeed {
    pub fn new(config: ScreeningFeedConfig) -> Self {
        Self { config }
    }

    fn name_template(&self) -> Node {
        let mut name = Node::text_group(&[
            "pty:Type", "pty:Full", "pty:Tit", "pty:Fir", "pty:Mid", "pty:Sur", "pty:Ma",
        ])
        .with_wire_order(NAME_WIRE_ORDER);
        name.set_field("Type", Some(self.config.name_type.clone()));
        name
    }

    fn write_root<W: std::io::Write>(
        &self,
        writer: &mut Writer<W>,
        document: &FeedDocument,
    ) -> Result<()> {
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

        let mut root = BytesStart::new("NLSFeed");
        root.push_attribute(("xmlns", NS_FILE_DEFINITION));
        root.push_attribute(("xmlns:req", NS_REQUEST));
        root.push_attribute(("xmlns:pty", NS_PARTY));
        writer.write_event(Event::Start(root))?;
        writer.write_event(Event::Start(BytesStart::new("Request")))?;

        document.header.write_xml(writer, "req:Meta")?;
        writer.write_event(Event::Start(BytesStart::new("req:Recs")))?;
        for record in &document.records {
            record.write_xml(writer, "req:Rec")?;
        }
        writer.write_event(Event::End(BytesEnd::new("req:Recs")))?;

        writer.write_event(Event::End(BytesEnd::new("Request")))?;
        writer.write_event(Event::End(BytesEnd::new("NLSFeed")))?;
        Ok(())
    }
}

/// SHA-256 over the text of the whole record in declaration order,
/// leaving out the `ChkSum` slot
pub fn structural_checksum(record: &Node) -> Option<String> {
    record.child("Meta")?.child("ChkSum")?;
    let mut text = String::new();
    record.collect_text_except(&mut text, Some("ChkSum"));
    Some(sha256_hex_upper(text.as_bytes()))
}

/// Stable id for a record the upstream system sent without a client id
fn fallback_record_id(record: &InputRecord) -> String {
    let snapshot = serde_json::to_vec(record).unwrap_or_default();
    Uuid::new_v5(&Uuid::NAMESPACE_OID, &snapshot).to_string()
}

impl FeedStrategy for ScreeningFeed {
    fn kind(&self) -> FeedKind {
        FeedKind::Screening
    }

    fn batch_prefix(&self) -> &str {
        &self.config.batch_prefix
    }

    fn extension(&self) -> &'static str {
        "xml"
    }

    fn header(&self, batch: &BatchName, record_count: usize, now: DateTime<Utc>) -> Node {
        Node::group([
            ("req:SrcId", Node::text(&self.config.source_id)),
            ("req:ToR", Node::text(&self.config.transfer_type)),
            (
                "req:CrtTm",
                Node::text(now.format(CREATED_TIME_FORMAT).to_string()),
            ),
            ("req:NoR", Node::text(record_count.to_string())),
            (
                "req:FInfo",
                Node::group([
                    ("req:Name", Node::text(batch.as_str())),
                    ("req:BatchNr", Node::text(&self.config.batch_number)),
                ]),
            ),
        ])
    }

    fn record_skeleton(&self, record: &InputRecord, _now: DateTime<Utc>) -> Node {
        let record_id = record
            .client_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| fallback_record_id(record));

        let mut meta =
            Node::text_group(&["req:UniRcrdId", "req:RecStat", "req:ChkSum", "req:Type"]);
        meta.set_field("UniRcrdId", Some(record_id));
        meta.set_field("RecStat", Some(self.config.record_status.clone()));
        meta.set_field("Type", Some(self.config.record_type.clone()));

        let mut primary_name = self.name_template();
        primary_name.set_field("Full", record.full_name());
        let mut names = Node::repeated("pty:Name", self.name_template());
        names.push_item(primary_name);

        let individual = Node::group([
            ("pty:Names", names),
            ("pty:G", Node::empty()),
            ("pty:DOB", Node::empty()),
            ("pty:Plc", Node::empty()),
            ("pty:Cntr", Node::empty()),
            ("pty:Occ", Node::empty()),
            (
                "pty:Nats",
                Node::repeated(
                    "pty:Nat",
                    Node::text_group(&["pty:Cntr", "pty:LegDoc", "pty:IdNr", "pty:CA"]),
                ),
            ),
            (
                "pty:Addrs",
                Node::repeated(
                    "pty:Addr",
                    Node::text_group(&[
                        "pty:Type",
                        "pty:Line",
                        "pty:City",
                        "pty:ZipCode",
                        "pty:Prov",
                        "pty:Cntr",
                    ]),
                ),
            ),
        ])
        .with_wire_order(INDIVIDUAL_WIRE_ORDER);

        let party = Node::group([
            ("req:Ind", individual),
            (
                "req:Acc",
                Node::text_group(&["req:Type", "req:Nr", "req:AI", "req:SoW"]),
            ),
        ]);

        let business_unit = Node::text_group(&[
            "req:RelSrcId",
            "req:RecCntrOrg",
            "req:RecBD",
            "req:DBLE",
            "req:DBLELoc",
            "req:LBJ",
            "req:LAFCJ",
            "req:BSRL",
            "req:RR",
            "req:HRPI",
        ]);

        let data = Node::group([
            ("req:PrtInfo", party),
            ("req:JuriInfo", Node::repeated("req:BU", business_unit)),
            (
                "req:KYCData",
                Node::group([
                    ("req:PEPFlag", Node::empty()),
                    ("req:NextRvw", Node::text_group(&["req:KYC"])),
                ]),
            ),
            ("req:Comment", Node::empty()),
        ]);

        Node::group([("req:Meta", meta), ("req:Data", data)])
    }

    fn finish_record(&self, record: &mut Node) -> Result<()> {
        let checksum = structural_checksum(record);
        let written = record
            .child_mut("Meta")
            .is_some_and(|meta| meta.set_field("ChkSum", checksum));
        if written {
            Ok(())
        } else {
            Err(BatchfeedError::Other(
                "Screening record has no Meta block for its checksum".to_string(),
            ))
        }
    }

    fn serialize(&self, document: &FeedDocument) -> Result<Vec<u8>> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        self.write_root(&mut writer, document)?;
        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn render_record(&self, record: &Node) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        record.write_xml_with_attributes(
            &mut writer,
            "req:Rec",
            &[("xmlns:req", NS_REQUEST), ("xmlns:pty", NS_PARTY)],
        )?;
        String::from_utf8(writer.into_inner())
            .map_err(|e| BatchfeedError::Serialization(e.to_string()))
    }
}
