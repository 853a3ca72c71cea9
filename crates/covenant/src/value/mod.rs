//! Runtime values carried by requests, responses and generated examples.
//!
//! A [`Value`] is an immutable JSON/XML-like datum. Values are produced by
//! parsing wire payloads or by pattern generation, and are consumed by
//! pattern matching.

mod xml;

pub use xml::{XmlChild, XmlNode};

use crate::error::ContractError;
use indexmap::IndexMap;
use serde_json::Number;
use std::fmt;

/// A JSON/XML-like runtime datum
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Number(Number),
    String(String),
    Object(IndexMap<String, Value>),
    Array(Vec<Value>),
    Xml(XmlNode),
    /// Absent body (no payload on the wire)
    Empty,
}

impl Value {
    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    pub fn integer(value: i64) -> Self {
        Value::Number(Number::from(value))
    }

    /// Build a number value; NaN and infinities collapse to zero
    pub fn float(value: f64) -> Self {
        Value::Number(Number::from_f64(value).unwrap_or_else(|| Number::from(0)))
    }

    pub fn object(entries: impl IntoIterator<Item = (String, Value)>) -> Self {
        Value::Object(entries.into_iter().collect())
    }

    /// Convert from a serde_json value, keeping key order
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to a serde_json value. XML nodes become their serialized text.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::Empty => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Xml(node) => serde_json::Value::String(node.to_xml_string()),
        }
    }

    /// Parse a raw payload, guessing JSON, XML or plain text from its shape
    pub fn parse_payload(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Value::Empty;
        }
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
                return Value::from_json(json);
            }
        }
        if trimmed.starts_with('<') {
            if let Ok(node) = XmlNode::parse(trimmed) {
                return Value::Xml(node);
            }
        }
        Value::String(text.to_string())
    }

    /// Parse a payload that must be JSON
    pub fn parse_json(text: &str) -> Result<Self, ContractError> {
        serde_json::from_str::<serde_json::Value>(text)
            .map(Value::from_json)
            .map_err(|e| ContractError::Parse(format!("JSON payload: {e}")))
    }

    /// Short type name used in mismatch messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) => "json object",
            Value::Array(_) => "json array",
            Value::Xml(_) => "xml",
            Value::Empty => "empty",
        }
    }

    /// Value rendered for mismatch reports, e.g. `10 (number)`
    pub fn display_with_type(&self) -> String {
        match self {
            Value::Empty => "empty".to_string(),
            Value::Null => "null".to_string(),
            Value::String(s) => format!("\"{s}\""),
            other => format!("{other} ({})", other.type_name()),
        }
    }

    /// Text form used on the wire for headers, query params and plain bodies
    pub fn to_wire_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Empty => String::new(),
            Value::Xml(node) => node.to_xml_string(),
            Value::Object(_) | Value::Array(_) => self.to_json().to_string(),
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
        }
    }

    /// Content type implied by this value when used as a body
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            Value::Object(_) | Value::Array(_) => Some("application/json"),
            Value::Xml(_) => Some("text/xml"),
            Value::Empty => None,
            _ => Some("text/plain"),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_empty_body(&self) -> bool {
        matches!(self, Value::Empty)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Xml(node) => write!(f, "{}", node.to_xml_string()),
            Value::Empty => Ok(()),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::from_json(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_payload_json_keeps_key_order() {
        let value = Value::parse_payload(r#"{"b": 1, "a": 2}"#);
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_parse_payload_text_and_empty() {
        assert_eq!(Value::parse_payload("hello"), Value::string("hello"));
        assert_eq!(Value::parse_payload("   "), Value::Empty);
        // Broken JSON falls back to text
        assert_eq!(Value::parse_payload("{oops"), Value::string("{oops"));
    }

    #[test]
    fn test_parse_payload_xml() {
        let value = Value::parse_payload("<user id=\"10\"><name>jane</name></user>");
        match value {
            Value::Xml(node) => {
                assert_eq!(node.name, "user");
                assert_eq!(node.attributes.get("id").map(String::as_str), Some("10"));
            }
            other => panic!("expected xml, got {other:?}"),
        }
    }

    #[test]
    fn test_json_round_trip_and_display() {
        let original = json!({"id": 10, "tags": ["a", "b"], "active": true});
        let value = Value::from_json(original.clone());
        assert_eq!(value.to_json(), original);
        assert_eq!(Value::integer(10).display_with_type(), "10 (number)");
        assert_eq!(Value::string("x").to_wire_string(), "x");
        assert_eq!(Value::integer(42).to_wire_string(), "42");
    }
}
