//! XML node values, parsed with sxd-document.

use crate::error::ContractError;
use indexmap::IndexMap;
use sxd_document::dom::{ChildOfElement, ChildOfRoot, Element};
use sxd_document::parser;

/// An XML element with attributes and ordered children
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlNode {
    pub name: String,
    pub attributes: IndexMap<String, String>,
    pub children: Vec<XmlChild>,
}

/// A child of an XML element
#[derive(Debug, Clone, PartialEq)]
pub enum XmlChild {
    Node(XmlNode),
    Text(String),
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse an XML document into its root element
    pub fn parse(text: &str) -> Result<Self, ContractError> {
        let package =
            parser::parse(text).map_err(|e| ContractError::Parse(format!("XML payload: {e:?}")))?;
        let document = package.as_document();
        document
            .root()
            .children()
            .into_iter()
            .find_map(|child| match child {
                ChildOfRoot::Element(element) => Some(Self::from_element(element)),
                _ => None,
            })
            .ok_or_else(|| ContractError::Parse("XML payload: no root element".to_string()))
    }

    fn from_element(element: Element<'_>) -> Self {
        let attributes = element
            .attributes()
            .into_iter()
            .map(|attr| (attr.name().local_part().to_string(), attr.value().to_string()))
            .collect();
        // The parser splits text around entity references; rejoin each run
        let mut children = Vec::new();
        let mut run = String::new();
        for child in element.children() {
            match child {
                ChildOfElement::Text(text) => run.push_str(text.text()),
                ChildOfElement::Element(inner) => {
                    flush_text(&mut run, &mut children);
                    children.push(XmlChild::Node(Self::from_element(inner)));
                }
                _ => {}
            }
        }
        flush_text(&mut run, &mut children);
        Self {
            name: element.name().local_part().to_string(),
            attributes,
            children,
        }
    }

    /// Concatenated text content of direct text children
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                XmlChild::Text(t) => Some(t.as_str()),
                XmlChild::Node(_) => None,
            })
            .collect()
    }

    pub fn child_nodes(&self) -> impl Iterator<Item = &XmlNode> {
        self.children.iter().filter_map(|child| match child {
            XmlChild::Node(node) => Some(node),
            XmlChild::Text(_) => None,
        })
    }

    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out);
        out
    }

    fn write_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push_str(&format!(" {key}=\"{}\"", escape(value)));
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                XmlChild::Node(node) => node.write_into(out),
                XmlChild::Text(text) => out.push_str(&escape(text)),
            }
        }
        out.push_str(&format!("</{}>", self.name));
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn flush_text(run: &mut String, children: &mut Vec<XmlChild>) {
    let content = run.trim();
    if !content.is_empty() {
        children.push(XmlChild::Text(content.to_string()));
    }
    run.clear();
}
