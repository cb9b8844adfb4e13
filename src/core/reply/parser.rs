//! Reply document parsing
//!
//! Vendor replies come in two shapes, `Notification` and `Feedback`, either
//! as the document root or wrapped in an `NLSFeed`. Elements are matched by
//! local name so namespace prefixes and URIs do not matter.

use crate::domain::{BatchfeedError, MatchResult, RecordError, ReplyEffect, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

/// A parsed element: local name, trimmed text and children in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    fn new(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text of the element at a `/`-separated path of local names
    ///
    /// Empty text reads as `None`.
    pub fn text_at(&self, path: &str) -> Option<String> {
        let mut current = self;
        for part in path.split('/') {
            current = current.child(part)?;
        }
        let text = current.text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

fn xml_err(e: impl std::fmt::Display) -> BatchfeedError {
    BatchfeedError::Serialization(format!("XML error: {e}"))
}

/// Parses an XML document into an [`Element`] tree
pub fn parse_element_tree(bytes: &[u8]) -> Result<Element> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(start) => {
                let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                stack.push(Element::new(name));
            }
            Event::Empty(start) => {
                let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                attach(&mut stack, &mut root, Element::new(name))?;
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text.unescape().map_err(xml_err)?);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current
                        .text
                        .push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| xml_err("unexpected closing tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(xml_err("document ended inside an element"));
    }
    root.ok_or_else(|| xml_err("document has no root element"))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(xml_err("more than one root element")),
    }
    Ok(())
}

/// A recognized reply and how it should be applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    /// Outbound file name echoed in `Meta/FInfo/Name`, if present
    pub correlation_id: Option<String>,
    pub effect: ReplyEffect,
}

/// Parses a reply payload; `Ok(None)` means the root is not a known reply shape
pub fn parse_reply(bytes: &[u8]) -> Result<Option<ParsedReply>> {
    let root = parse_element_tree(bytes)?;
    Ok(interpret(&root))
}

fn interpret(root: &Element) -> Option<ParsedReply> {
    match root.name.as_str() {
        "Notification" => Some(notification(root)),
        "Feedback" => Some(feedback(root)),
        "NLSFeed" => {
            let mut replies = root
                .children
                .iter()
                .filter(|c| matches!(c.name.as_str(), "Notification" | "Feedback"));
            let first = replies.next()?;
            if replies.next().is_some() {
                tracing::warn!("NLSFeed carries more than one reply; only the first is applied");
            }
            interpret(first)
        }
        other => {
            tracing::debug!(root = %other, "Unrecognized reply root");
            None
        }
    }
}

fn correlation_id(root: &Element) -> Option<String> {
    root.text_at("Meta/FInfo/Name")
}

fn notification(root: &Element) -> ParsedReply {
    let errors = root
        .child("RecordNoti")
        .into_iter()
        .flat_map(|list| list.children_named("Rec"))
        .flat_map(|rec| {
            let record_id = rec.text_at("UniRcrdId");
            rec.children_named("Err").map(move |err| RecordError {
                record_id: record_id.clone(),
                code: err.text_at("ErrCode"),
                message: err.text_at("ErrDesc"),
            })
        })
        .collect();

    ParsedReply {
        correlation_id: correlation_id(root),
        effect: ReplyEffect::Notification {
            vendor_status: root.text_at("Meta/Stat"),
            errors,
        },
    }
}

fn feedback(root: &Element) -> ParsedReply {
    let results = root
        .child("FbRecs")
        .into_iter()
        .flat_map(|list| list.children_named("FbRec"))
        .flat_map(|rec| {
            let record_id = rec.text_at("UniRcrdId");
            rec.children_named("Mat").map(move |mat| MatchResult {
                record_id: record_id.clone(),
                match_id: mat.text_at("MatchId"),
                match_name: mat.text_at("MatchName"),
                score: mat.text_at("Score"),
                status: mat.text_at("Stat"),
            })
        })
        .collect();

    let nor = root.text_at("Meta/Nor");
    let record_count = match nor.as_deref().map(str::parse::<i32>) {
        Some(Ok(count)) => count,
        Some(Err(_)) => {
            tracing::warn!(nor = ?nor, "Feedback record count is not a number, storing 0");
            0
        }
        None => 0,
    };

    ParsedReply {
        correlation_id: correlation_id(root),
        effect: ReplyEffect::Feedback {
            record_count,
            results,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTIFICATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<noti:Notification xmlns:noti="http://www.db.com/NLSNotification">
  <noti:Meta>
    <noti:SrcId>2475</noti:SrcId>
    <noti:Stat>RJCT</noti:Stat>
  </noti:Meta>
  <noti:RecordNoti>
    <noti:Rec>
      <noti:UniRcrdId>1001</noti:UniRcrdId>
      <noti:Err><noti:ErrCode>E042</noti:ErrCode><noti:ErrDesc>Missing date of birth &amp; country</noti:ErrDesc></noti:Err>
      <noti:Err><noti:ErrCode>E043</noti:ErrCode></noti:Err>
    </noti:Rec>
    <noti:Rec><noti:UniRcrdId>1002</noti:UniRcrdId></noti:Rec>
  </noti:RecordNoti>
</noti:Notification>"#;

    #[test]
    fn test_notification_errors_flattened_per_record() {
        let reply = parse_reply(NOTIFICATION.as_bytes()).unwrap().unwrap();
        assert_eq!(reply.correlation_id, None);
        match reply.effect {
            ReplyEffect::Notification {
                vendor_status,
                errors,
            } => {
                assert_eq!(vendor_status.as_deref(), Some("RJCT"));
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0].record_id.as_deref(), Some("1001"));
                assert_eq!(errors[0].code.as_deref(), Some("E042"));
                assert_eq!(
                    errors[0].message.as_deref(),
                    Some("Missing date of birth & country")
                );
                assert_eq!(errors[1].message, None);
            }
            other => panic!("expected notification, got {other:?}"),
        }
    }

    #[test]
    fn test_feedback_inside_nls_feed_with_correlation() {
        let xml = r#"<NLSFeed xmlns="http://www.db.com/NLSFileDefinition">
          <Feedback>
            <Meta><Nor>2</Nor><FInfo><Name>2475_RC_DELTA_20250101120000_1</Name></FInfo></Meta>
            <FbRecs>
              <FbRec>
                <UniRcrdId>1001</UniRcrdId>
                <Mat><MatchId>M1</MatchId><MatchName>Jane Doe</MatchName><Score>97</Score><Stat>OPEN</Stat></Mat>
                <Mat><MatchId>M2</MatchId></Mat>
              </FbRec>
              <FbRec><UniRcrdId>1002</UniRcrdId></FbRec>
            </FbRecs>
          </Feedback>
        </NLSFeed>"#;

        let reply = parse_reply(xml.as_bytes()).unwrap().unwrap();
        assert_eq!(
            reply.correlation_id.as_deref(),
            Some("2475_RC_DELTA_20250101120000_1")
        );
        match reply.effect {
            ReplyEffect::Feedback {
                record_count,
                results,
            } => {
                assert_eq!(record_count, 2);
                assert_eq!(results.len(), 2);
                assert_eq!(results[0].match_name.as_deref(), Some("Jane Doe"));
                assert_eq!(results[0].score.as_deref(), Some("97"));
                assert_eq!(results[1].record_id.as_deref(), Some("1001"));
                assert_eq!(results[1].status, None);
            }
            other => panic!("expected feedback, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_root_is_ignored() {
        assert_eq!(parse_reply(b"<Receipt><Meta/></Receipt>").unwrap(), None);
        assert_eq!(parse_reply(b"<NLSFeed><Request/></NLSFeed>").unwrap(), None);
    }

    #[test]
    fn test_malformed_xml_is_error() {
        let err = parse_reply(b"<Notification><Meta></Notification>").unwrap_err();
        assert!(matches!(err, BatchfeedError::Serialization(_)));
    }

    #[test]
    fn test_non_numeric_record_count_reads_zero() {
        let reply = parse_reply(b"<Feedback><Meta><Nor>many</Nor></Meta></Feedback>")
            .unwrap()
            .unwrap();
        assert_eq!(
            reply.effect,
            ReplyEffect::Feedback {
                record_count: 0,
                results: vec![]
            }
        );
    }
}
