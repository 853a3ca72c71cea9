//! XML node shapes.
//!
//! Attribute values and text content are wire strings, so they are checked
//! by parsing them through their pattern. Child elements are matched in
//! order, honouring each child's occurrence.

use super::{capped_product, example_pattern, ObjectField, Pattern};
use crate::error::ContractError;
use crate::examples::Row;
use crate::resolver::Resolver;
use crate::result::MatchResult;
use crate::value::{Value, XmlChild, XmlNode};
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XmlOccurrence {
    #[default]
    Once,
    Optional,
    /// Zero or more
    Multiple,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlChildPattern {
    pub pattern: Pattern,
    pub occurrence: XmlOccurrence,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlPattern {
    pub name: String,
    pub attributes: IndexMap<String, ObjectField>,
    pub text: Option<Box<Pattern>>,
    pub children: Vec<XmlChildPattern>,
    pub type_alias: Option<String>,
}

impl XmlPattern {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        let parsed;
        let node = match value {
            Value::Xml(node) => node,
            Value::String(text) => match XmlNode::parse(text) {
                Ok(node) => {
                    parsed = node;
                    &parsed
                }
                Err(_) => return resolver.mismatch(&format!("xml node <{}>", self.name), value),
            },
            other => return resolver.mismatch(&format!("xml node <{}>", self.name), other),
        };

        if node.name != self.name {
            return resolver.mismatch_text(
                &format!("xml node <{}>", self.name),
                &format!("xml node <{}>", node.name),
            );
        }

        let actual_attributes: Vec<&str> = node.attributes.keys().map(String::as_str).collect();
        let mut results = resolver.check_keys(
            self.attributes
                .iter()
                .map(|(name, field)| (name.as_str(), field.optional)),
            &actual_attributes,
            false,
            "attribute",
            false,
        );
        for (name, field) in &self.attributes {
            if let Some(text) = node.attributes.get(name) {
                results.push(wire_text_matches(&field.pattern, text, resolver).breadcrumb(name.as_str()));
            }
        }

        if let Some(text_pattern) = &self.text {
            results.push(wire_text_matches(text_pattern, &node.text(), resolver));
        }

        results.push(self.children_match(node, resolver));
        MatchResult::all(results)
    }

    fn children_match(&self, node: &XmlNode, resolver: &Resolver) -> MatchResult {
        let nodes: Vec<&XmlNode> = node.child_nodes().collect();
        let mut position = 0;
        let mut results = Vec::new();

        for child in &self.children {
            let expected = expected_node_name(&child.pattern, resolver);
            let is_candidate = |candidate: &XmlNode| match &expected {
                Some(name) => &candidate.name == name,
                None => child
                    .pattern
                    .matches(&Value::Xml(candidate.clone()), resolver)
                    .is_success(),
            };

            match child.occurrence {
                XmlOccurrence::Once => match nodes.get(position) {
                    Some(candidate) => {
                        results.push(
                            child
                                .pattern
                                .matches(&Value::Xml((*candidate).clone()), resolver)
                                .breadcrumb(candidate.name.as_str()),
                        );
                        position += 1;
                    }
                    None => {
                        let name = expected.clone().unwrap_or_else(|| child.pattern.type_name());
                        results.push(
                            MatchResult::failure(
                                resolver.messages().expected_key_missing("node", &name),
                            )
                            .breadcrumb(name),
                        );
                    }
                },
                XmlOccurrence::Optional | XmlOccurrence::Multiple => {
                    while let Some(candidate) = nodes.get(position) {
                        if !is_candidate(candidate) {
                            break;
                        }
                        results.push(
                            child
                                .pattern
                                .matches(&Value::Xml((*candidate).clone()), resolver)
                                .breadcrumb(candidate.name.as_str()),
                        );
                        position += 1;
                        if child.occurrence == XmlOccurrence::Optional {
                            break;
                        }
                    }
                }
            }
        }

        for extra in &nodes[position.min(nodes.len())..] {
            results.push(
                MatchResult::failure(resolver.messages().unexpected_key("node", &extra.name))
                    .breadcrumb(extra.name.as_str()),
            );
        }
        MatchResult::all(results)
    }

    pub fn generate(&self, resolver: &Resolver) -> XmlNode {
        let mut node = XmlNode::new(self.name.clone());
        node.attributes = self
            .attributes
            .iter()
            .map(|(name, field)| (name.clone(), field.pattern.generate(resolver).to_wire_string()))
            .collect();

        if let Some(text_pattern) = &self.text {
            node.children
                .push(XmlChild::Text(text_pattern.generate(resolver).to_wire_string()));
        }

        for child in &self.children {
            let skip = child.occurrence != XmlOccurrence::Once && child.pattern.leads_to_cycle(resolver);
            if skip {
                continue;
            }
            match child.pattern.generate(resolver) {
                Value::Xml(inner) => node.children.push(XmlChild::Node(inner)),
                Value::Null => {}
                other => node.children.push(XmlChild::Text(other.to_wire_string())),
            }
        }
        node
    }

    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Self>, ContractError> {
        let mut attributes = IndexMap::new();
        for (name, field) in &self.attributes {
            let pattern = match row.field(name) {
                Some(cell) => example_pattern(&field.pattern, name, &cell, resolver)?,
                None => field.pattern.clone(),
            };
            attributes.insert(name.clone(), ObjectField { pattern, optional: field.optional });
        }

        let text = match (&self.text, row.field(&self.name)) {
            (Some(pattern), Some(cell)) => Some(Box::new(example_pattern(pattern, &self.name, &cell, resolver)?)),
            (text, _) => text.clone(),
        };

        let mut slots = Vec::with_capacity(self.children.len());
        for child in &self.children {
            if child.pattern.leads_to_cycle(resolver) {
                slots.push(vec![child.clone()]);
                continue;
            }
            slots.push(
                child
                    .pattern
                    .new_based_on(row, resolver)?
                    .into_iter()
                    .map(|pattern| XmlChildPattern {
                        pattern,
                        occurrence: child.occurrence,
                    })
                    .collect(),
            );
        }

        Ok(capped_product(&slots, resolver.max_combinations())
            .into_iter()
            .map(|children| Self {
                name: self.name.clone(),
                attributes: attributes.clone(),
                text: text.clone(),
                children,
                type_alias: self.type_alias.clone(),
            })
            .collect())
    }
}

fn wire_text_matches(pattern: &Pattern, text: &str, resolver: &Resolver) -> MatchResult {
    match pattern.parse(text, resolver) {
        Ok(_) => MatchResult::Success,
        Err(_) => resolver.mismatch_text(&pattern.type_name(), &format!("\"{text}\"")),
    }
}

fn expected_node_name(pattern: &Pattern, resolver: &Resolver) -> Option<String> {
    match pattern.resolve(resolver).ok()? {
        Pattern::Xml(xml) => Some(xml.name.clone()),
        _ => None,
    }
}
