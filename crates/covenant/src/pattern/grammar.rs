//! Building patterns from type tokens and JSON documents.
//!
//! ## Tokens
//!
//! - `(string)`, `(number)`, `(integer)`, `(boolean)`, `(null)`, `(date)`,
//!   `(datetime)`, `(uuid)`, `(email)`, `(url)`, `(binary)`, `(anything)`
//! - `(Name)`: reference to the pattern bound to `Name`
//! - `(T?)`: `T` or null
//! - `(T*)`: list of `T`
//!
//! ## Documents
//!
//! - objects become object patterns; `key?` is optional, `"..."` opens the object
//! - `{"oneOf": [..], "discriminator": {..}}`, `{"anyOf": [..]}`, `{"allOf": [..]}`
//! - `{"dictionary": [K, V]}`
//! - `{"xml": {"name", "attributes", "text", "children"}}`
//! - `{"type": "string", "minLength", "maxLength", "enum", "example"}`
//! - `{"type": "number" | "integer", "minimum", "maximum", "exclusiveMinimum",
//!   "exclusiveMaximum", "example"}`
//! - arrays holding a single list token are lists, other arrays are tuples
//! - any other literal matches itself exactly

use super::{
    AllOfPattern, AnyOfPattern, AnyPattern, DictionaryPattern, Discriminator,
    NumberConstraints, ObjectField, ObjectPattern, Pattern, ScalarPattern, StringConstraints,
    XmlChildPattern, XmlOccurrence, XmlPattern,
};
use crate::error::ContractError;
use crate::value::Value;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value as Json};

static TYPE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("type name pattern is valid"));

const ONE_OF_KEYS: &[&str] = &["oneOf", "discriminator"];
const STRING_KEYS: &[&str] = &["type", "minLength", "maxLength", "enum", "example"];
const NUMBER_KEYS: &[&str] = &[
    "type",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "example",
];

/// Pattern named by a type token such as `(number)` or `(Person?)`
pub fn token_pattern(text: &str) -> Option<Pattern> {
    let inner = text.strip_prefix('(')?.strip_suffix(')')?.trim();
    if let Some(base) = inner.strip_suffix('?') {
        return token_pattern(&format!("({base})")).map(Pattern::nullable);
    }
    if let Some(base) = inner.strip_suffix('*') {
        return token_pattern(&format!("({base})")).map(Pattern::list_of);
    }

    let scalar = match inner {
        "string" => Pattern::string(),
        "number" => Pattern::number(),
        "integer" => Pattern::integer(),
        "boolean" => Pattern::boolean(),
        "null" => Pattern::null(),
        "date" => Pattern::Scalar(ScalarPattern::Date),
        "datetime" => Pattern::Scalar(ScalarPattern::DateTime),
        "uuid" => Pattern::Scalar(ScalarPattern::Uuid),
        "email" => Pattern::Scalar(ScalarPattern::Email),
        "url" => Pattern::Scalar(ScalarPattern::Url),
        "binary" => Pattern::Scalar(ScalarPattern::Binary),
        "anything" => Pattern::Anything,
        name if TYPE_NAME.is_match(name) => Pattern::Deferred(name.to_string()),
        _ => return None,
    };
    Some(scalar)
}

/// Build a pattern from a JSON document
pub fn parse_pattern(doc: &Json) -> Result<Pattern, ContractError> {
    match doc {
        Json::String(text) => {
            Ok(token_pattern(text).unwrap_or_else(|| Pattern::Exact(Value::String(text.clone()))))
        }
        Json::Array(items) => parse_array(items),
        Json::Object(map) => parse_object(map),
        literal => Ok(Pattern::Exact(Value::from_json(literal.clone()))),
    }
}

fn parse_array(items: &[Json]) -> Result<Pattern, ContractError> {
    if let [Json::String(token)] = items {
        if let Some(list @ Pattern::List(_)) = token_pattern(token) {
            return Ok(list);
        }
    }
    Ok(Pattern::Tuple(
        items.iter().map(parse_pattern).collect::<Result<_, _>>()?,
    ))
}

fn parse_object(map: &Map<String, Json>) -> Result<Pattern, ContractError> {
    let has_only = |allowed: &[&str]| map.keys().all(|k| allowed.contains(&k.as_str()));

    if let Some(options) = map.get("oneOf") {
        if has_only(ONE_OF_KEYS) {
            let mut any = AnyPattern::new(parse_options("oneOf", options)?);
            if let Some(discriminator) = map.get("discriminator") {
                any.discriminator = Some(parse_discriminator(discriminator)?);
            }
            return Ok(Pattern::Any(any));
        }
    }
    if map.len() == 1 {
        if let Some(options) = map.get("anyOf") {
            return Ok(Pattern::AnyOf(AnyOfPattern::new(parse_options("anyOf", options)?)));
        }
        if let Some(options) = map.get("allOf") {
            return Ok(Pattern::AllOf(AllOfPattern::new(parse_options("allOf", options)?)));
        }
        if let Some(pair) = map.get("dictionary") {
            return parse_dictionary(pair);
        }
        if let Some(xml) = map.get("xml") {
            return parse_xml(xml).map(Pattern::Xml);
        }
    }
    if let Some(Json::String(kind)) = map.get("type") {
        match kind.as_str() {
            "string" if has_only(STRING_KEYS) => return parse_string_schema(map),
            "number" | "integer" if has_only(NUMBER_KEYS) => {
                return parse_number_schema(map, kind == "integer")
            }
            _ => {}
        }
    }

    let mut object = ObjectPattern::new();
    for (key, value) in map {
        if key == "..." {
            object.open = true;
            continue;
        }
        let pattern = parse_pattern(value)?;
        match key.strip_suffix('?') {
            Some(name) => object.fields.insert(name.to_string(), ObjectField::optional(pattern)),
            None => object.fields.insert(key.clone(), ObjectField::mandatory(pattern)),
        };
    }
    Ok(Pattern::Object(object))
}

fn parse_options(keyword: &str, doc: &Json) -> Result<Vec<Pattern>, ContractError> {
    let Json::Array(items) = doc else {
        return Err(ContractError::malformed(format!("{keyword} must be a list of schemas")));
    };
    if items.is_empty() {
        return Err(ContractError::malformed(format!("{keyword} must not be empty")));
    }
    items.iter().map(parse_pattern).collect()
}

fn parse_discriminator(doc: &Json) -> Result<Discriminator, ContractError> {
    let property = doc
        .get("propertyName")
        .and_then(Json::as_str)
        .ok_or_else(|| ContractError::malformed("discriminator needs a propertyName"))?;
    let mut mapping = IndexMap::new();
    if let Some(Json::Object(entries)) = doc.get("mapping") {
        for (tag, target) in entries {
            mapping.insert(tag.clone(), parse_pattern(target)?);
        }
    }
    if mapping.is_empty() {
        return Err(ContractError::malformed(format!(
            "discriminator on {property} has no mapping"
        )));
    }
    Ok(Discriminator {
        property: property.to_string(),
        mapping,
    })
}

fn parse_dictionary(doc: &Json) -> Result<Pattern, ContractError> {
    match doc {
        Json::Array(pair) if pair.len() == 2 => Ok(Pattern::Dictionary(DictionaryPattern::new(
            parse_pattern(&pair[0])?,
            parse_pattern(&pair[1])?,
        ))),
        _ => Err(ContractError::malformed(
            "dictionary must be a [key, value] pair of schemas",
        )),
    }
}

fn parse_string_schema(map: &Map<String, Json>) -> Result<Pattern, ContractError> {
    if let Some(values) = map.get("enum") {
        let Json::Array(values) = values else {
            return Err(ContractError::malformed("enum must be a list of values"));
        };
        if values.is_empty() {
            return Err(ContractError::malformed("enum must not be empty"));
        }
        return Ok(Pattern::Any(AnyPattern::new(
            values
                .iter()
                .map(|v| Pattern::Exact(Value::from_json(v.clone())))
                .collect(),
        )));
    }
    let length = |key: &str| -> Result<Option<usize>, ContractError> {
        match map.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_u64()
                .map(|n| Some(n as usize))
                .ok_or_else(|| ContractError::malformed(format!("{key} must be a non-negative integer"))),
        }
    };
    let constraints = StringConstraints {
        min_length: length("minLength")?,
        max_length: length("maxLength")?,
        example: map.get("example").and_then(Json::as_str).map(str::to_string),
    };
    if let (Some(min), Some(max)) = (constraints.min_length, constraints.max_length) {
        if min > max {
            return Err(ContractError::malformed(format!(
                "minLength {min} is greater than maxLength {max}"
            )));
        }
    }
    Ok(Pattern::Scalar(ScalarPattern::String(constraints)))
}

fn parse_number_schema(map: &Map<String, Json>, integer: bool) -> Result<Pattern, ContractError> {
    let bound = |key: &str| -> Result<Option<f64>, ContractError> {
        match map.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_f64()
                .map(Some)
                .ok_or_else(|| ContractError::malformed(format!("{key} must be a number"))),
        }
    };
    let flag = |key: &str| map.get(key).and_then(Json::as_bool).unwrap_or(false);
    let constraints = NumberConstraints {
        minimum: bound("minimum")?,
        maximum: bound("maximum")?,
        exclusive_minimum: flag("exclusiveMinimum"),
        exclusive_maximum: flag("exclusiveMaximum"),
        integer,
        example: bound("example")?,
    };
    if let (Some(min), Some(max)) = (constraints.minimum, constraints.maximum) {
        if min > max {
            return Err(ContractError::malformed(format!(
                "minimum {min} is greater than maximum {max}"
            )));
        }
    }
    Ok(Pattern::Scalar(ScalarPattern::Number(constraints)))
}

fn parse_xml(doc: &Json) -> Result<XmlPattern, ContractError> {
    let name = doc
        .get("name")
        .and_then(Json::as_str)
        .ok_or_else(|| ContractError::malformed("xml node needs a name"))?;
    let mut xml = XmlPattern::new(name);

    if let Some(Json::Object(attributes)) = doc.get("attributes") {
        for (key, value) in attributes {
            let pattern = parse_pattern(value)?;
            let (name, field) = match key.strip_suffix('?') {
                Some(name) => (name.to_string(), ObjectField::optional(pattern)),
                None => (key.clone(), ObjectField::mandatory(pattern)),
            };
            xml.attributes.insert(name, field);
        }
    }
    if let Some(text) = doc.get("text") {
        xml.text = Some(Box::new(parse_pattern(text)?));
    }
    if let Some(Json::Array(children)) = doc.get("children") {
        for child in children {
            xml.children.push(parse_xml_child(child)?);
        }
    }
    Ok(xml)
}

fn parse_xml_child(doc: &Json) -> Result<XmlChildPattern, ContractError> {
    if let Json::Object(map) = doc {
        if map.len() == 1 {
            let occurrence = match map.keys().next().map(String::as_str) {
                Some("optional") => Some(XmlOccurrence::Optional),
                Some("multiple") => Some(XmlOccurrence::Multiple),
                _ => None,
            };
            if let (Some(occurrence), Some(inner)) = (occurrence, map.values().next()) {
                return Ok(XmlChildPattern {
                    pattern: parse_pattern(inner)?,
                    occurrence,
                });
            }
        }
    }
    Ok(XmlChildPattern {
        pattern: parse_pattern(doc)?,
        occurrence: XmlOccurrence::Once,
    })
}
