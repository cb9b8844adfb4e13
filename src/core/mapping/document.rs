//! Nested output documents
//!
//! A feed document is a tree of [`Node`]s. Groups keep their children in
//! declaration order, which drives the structural checksum, and may carry a
//! separate wire order used only when the tree is written as XML. Element
//! names may carry a namespace prefix (`req:Meta`); JSON output and path
//! lookups use the local part only.

use crate::domain::Result;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::io::Write;

/// One node of an output document
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Scalar value; `None` is left out of every rendering
    Text(Option<String>),

    /// Named children in declaration order
    Group {
        fields: Vec<(String, Node)>,
        wire_order: Option<&'static [&'static str]>,
    },

    /// Homogeneous list; new items are cloned from `template`
    Repeated {
        item_name: String,
        template: Box<Node>,
        items: Vec<Node>,
    },
}

impl Node {
    /// Empty text slot
    pub fn empty() -> Self {
        Node::Text(None)
    }

    /// Text slot holding a value
    pub fn text(value: impl Into<String>) -> Self {
        Node::Text(Some(value.into()))
    }

    /// Group built from `(name, child)` pairs, in this declaration order
    pub fn group<N: Into<String>>(fields: impl IntoIterator<Item = (N, Node)>) -> Self {
        Node::Group {
            fields: fields.into_iter().map(|(n, v)| (n.into(), v)).collect(),
            wire_order: None,
        }
    }

    /// Group of empty text slots
    pub fn text_group(names: &[&str]) -> Self {
        Node::group(names.iter().map(|n| (*n, Node::empty())))
    }

    /// Empty list whose items look like `template`
    pub fn repeated(item_name: impl Into<String>, template: Node) -> Self {
        Node::Repeated {
            item_name: item_name.into(),
            template: Box::new(template),
            items: Vec::new(),
        }
    }

    /// Sets the XML emission order of a group, by local child name
    ///
    /// Children missing from `order` follow in declaration order.
    pub fn with_wire_order(mut self, order: &'static [&'static str]) -> Self {
        if let Node::Group { wire_order, .. } = &mut self {
            *wire_order = Some(order);
        }
        self
    }

    /// Value of a text node
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(value) => value.as_deref(),
            _ => None,
        }
    }

    /// Replaces the value of a text node; returns false for other kinds
    pub fn set_text(&mut self, value: Option<String>) -> bool {
        match self {
            Node::Text(slot) => {
                *slot = value;
                true
            }
            _ => false,
        }
    }

    /// Child of a group, matched by local name
    pub fn child(&self, name: &str) -> Option<&Node> {
        match self {
            Node::Group { fields, .. } => fields
                .iter()
                .find(|(n, _)| local_name(n) == name)
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Mutable child of a group, matched by local name
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        match self {
            Node::Group { fields, .. } => fields
                .iter_mut()
                .find(|(n, _)| local_name(n) == name)
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Sets a text child of a group, appending it when the group has none by that name
    pub fn set_field(&mut self, name: &str, value: Option<String>) -> bool {
        if let Some(existing) = self.child_mut(name) {
            return existing.set_text(value);
        }
        match self {
            Node::Group { fields, .. } => {
                fields.push((name.to_string(), Node::Text(value)));
                true
            }
            _ => false,
        }
    }

    /// First item of a list, created from the template if the list is empty
    pub fn first_mut(&mut self) -> Option<&mut Node> {
        match self {
            Node::Repeated {
                template, items, ..
            } => {
                if items.is_empty() {
                    items.push(template.as_ref().clone());
                }
                items.first_mut()
            }
            _ => None,
        }
    }

    /// Appends an item to a list
    pub fn push_item(&mut self, item: Node) -> bool {
        match self {
            Node::Repeated { items, .. } => {
                items.push(item);
                true
            }
            _ => false,
        }
    }

    /// Items of a list; empty for other kinds
    pub fn items(&self) -> &[Node] {
        match self {
            Node::Repeated { items, .. } => items,
            _ => &[],
        }
    }

    /// Looks a node up by a `/`-separated path of local names
    ///
    /// Inside a list a segment is either an index or the item name, which
    /// selects item 0.
    ///
    /// ```
    /// use batchfeed::core::mapping::document::Node;
    ///
    /// let mut names = Node::repeated("pty:Name", Node::text_group(&["pty:Full"]));
    /// names.first_mut().unwrap().set_field("Full", Some("Doe".into()));
    /// let doc = Node::group([("pty:Names", names)]);
    ///
    /// assert_eq!(doc.text_at("Names/Name/Full"), Some("Doe"));
    /// assert_eq!(doc.text_at("Names/0/Full"), Some("Doe"));
    /// ```
    pub fn find(&self, path: &str) -> Option<&Node> {
        let mut current = self;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = match current {
                Node::Group { .. } => current.child(segment)?,
                Node::Repeated {
                    item_name, items, ..
                } => {
                    let index = if local_name(item_name) == segment {
                        0
                    } else {
                        segment.parse::<usize>().ok()?
                    };
                    items.get(index)?
                }
                Node::Text(_) => return None,
            };
        }
        Some(current)
    }

    /// Text value at a path, see [`Node::find`]
    pub fn text_at(&self, path: &str) -> Option<&str> {
        self.find(path).and_then(Node::as_text)
    }

    /// Concatenates every text value depth-first in declaration order
    pub fn collect_text(&self, out: &mut String) {
        self.collect_text_except(out, None);
    }

    /// Like [`Node::collect_text`], leaving out any group field named `skip`
    pub fn collect_text_except(&self, out: &mut String, skip: Option<&str>) {
        match self {
            Node::Text(Some(value)) => out.push_str(value),
            Node::Text(None) => {}
            Node::Group { fields, .. } => {
                for (name, child) in fields {
                    if skip.is_some_and(|skip| local_name(name) == skip) {
                        continue;
                    }
                    child.collect_text_except(out, skip);
                }
            }
            Node::Repeated { items, .. } => {
                for item in items {
                    item.collect_text_except(out, skip);
                }
            }
        }
    }

    /// Writes this node as element `name`
    ///
    /// Empty text is omitted. Groups and lists are always emitted, even when
    /// they have no content.
    pub fn write_xml<W: Write>(&self, writer: &mut Writer<W>, name: &str) -> Result<()> {
        self.write_element(writer, name, &[])
    }

    /// Writes this node as element `name` with extra attributes on the start tag
    pub fn write_xml_with_attributes<W: Write>(
        &self,
        writer: &mut Writer<W>,
        name: &str,
        attributes: &[(&str, &str)],
    ) -> Result<()> {
        self.write_element(writer, name, attributes)
    }

    fn write_element<W: Write>(
        &self,
        writer: &mut Writer<W>,
        name: &str,
        attributes: &[(&str, &str)],
    ) -> Result<()> {
        let mut start = BytesStart::new(name);
        for attribute in attributes {
            start.push_attribute(*attribute);
        }

        match self {
            Node::Text(None) => {}
            Node::Text(Some(value)) => {
                writer.write_event(Event::Start(start))?;
                writer.write_event(Event::Text(BytesText::new(value)))?;
                writer.write_event(Event::End(BytesEnd::new(name)))?;
            }
            Node::Group { fields, wire_order } => {
                writer.write_event(Event::Start(start))?;
                for (child_name, child) in ordered(fields, *wire_order) {
                    child.write_element(writer, child_name, &[])?;
                }
                writer.write_event(Event::End(BytesEnd::new(name)))?;
            }
            Node::Repeated {
                item_name, items, ..
            } => {
                writer.write_event(Event::Start(start))?;
                for item in items {
                    item.write_element(writer, item_name, &[])?;
                }
                writer.write_event(Event::End(BytesEnd::new(name)))?;
            }
        }
        Ok(())
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Node::Text(value) => value.serialize(serializer),
            Node::Group { fields, .. } => {
                let present: Vec<&(String, Node)> = fields
                    .iter()
                    .filter(|(_, v)| !matches!(v, Node::Text(None)))
                    .collect();
                let mut map = serializer.serialize_map(Some(present.len()))?;
                for (name, child) in present {
                    map.serialize_entry(local_name(name), child)?;
                }
                map.end()
            }
            Node::Repeated { items, .. } => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

/// Part of an element name after the namespace prefix
pub fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

fn ordered<'a>(
    fields: &'a [(String, Node)],
    wire_order: Option<&'static [&'static str]>,
) -> Vec<(&'a str, &'a Node)> {
    let Some(order) = wire_order else {
        return fields.iter().map(|(n, v)| (n.as_str(), v)).collect();
    };

    let mut out: Vec<(&str, &Node)> = Vec::with_capacity(fields.len());
    for wanted in order {
        if let Some((n, v)) = fields.iter().find(|(n, _)| local_name(n) == *wanted) {
            out.push((n.as_str(), v));
        }
    }
    for (n, v) in fields {
        if !order.contains(&local_name(n)) {
            out.push((n.as_str(), v));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(node: &Node, name: &str) -> String {
        let mut writer = Writer::new(Vec::new());
        node.write_xml(&mut writer, name).unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn test_wire_order_differs_from_declaration_order() {
        let mut name =
            Node::text_group(&["Type", "Full", "Fir"]).with_wire_order(&["Type", "Fir", "Full"]);
        name.set_field("Type", Some("PN".into()));
        name.set_field("Full", Some("Jane Doe".into()));
        name.set_field("Fir", Some("Jane".into()));

        assert_eq!(
            render(&name, "Name"),
            "<Name><Type>PN</Type><Fir>Jane</Fir><Full>Jane Doe</Full></Name>"
        );

        let mut text = String::new();
        name.collect_text(&mut text);
        assert_eq!(text, "PNJane DoeJane");

        let mut without_type = String::new();
        name.collect_text_except(&mut without_type, Some("Type"));
        assert_eq!(without_type, "Jane DoeJane");
    }

    #[test]
    fn test_empty_text_omitted_and_groups_kept() {
        let doc = Node::group([
            ("req:Comment", Node::empty()),
            ("req:Acc", Node::text_group(&["req:Nr"])),
            ("req:JuriInfo", Node::repeated("req:BU", Node::text_group(&["req:RR"]))),
        ]);
        assert_eq!(
            render(&doc, "req:Data"),
            "<req:Data><req:Acc></req:Acc><req:JuriInfo></req:JuriInfo></req:Data>"
        );
    }

    #[test]
    fn test_text_is_escaped() {
        let node = Node::group([("Line", Node::text("A & B <C>"))]);
        assert_eq!(
            render(&node, "Addr"),
            "<Addr><Line>A &amp; B &lt;C&gt;</Line></Addr>"
        );
    }

    #[test]
    fn test_first_mut_creates_item_once() {
        let mut list = Node::repeated("Nat", Node::text_group(&["Cntr"]));
        assert!(list.items().is_empty());

        list.first_mut().unwrap().set_field("Cntr", Some("DE".into()));
        list.first_mut().unwrap().set_field("Cntr", Some("FR".into()));

        assert_eq!(list.items().len(), 1);
        assert_eq!(list.items()[0].text_at("Cntr"), Some("FR"));
    }

    #[test]
    fn test_json_uses_local_names_and_preserves_order() {
        let mut doc = Node::group([
            ("zeta", Node::text("1")),
            ("alpha", Node::empty()),
            ("pty:list", Node::repeated("x", Node::group(Vec::<(String, Node)>::new()))),
        ]);
        doc.set_field("beta", Some("2".into()));

        let json = serde_json::to_string(&doc).unwrap();
        assert_eq!(json, r#"{"zeta":"1","list":[],"beta":"2"}"#);
    }

    #[test]
    fn test_set_field_on_text_is_rejected() {
        let mut node = Node::text("x");
        assert!(!node.set_field("a", Some("b".into())));
        assert!(node.first_mut().is_none());
    }
}
