//! HTTP message shapes built from the pattern primitives.
//!
//! ## Module Structure
//!
//! - `message`: concrete [`HttpRequest`] / [`HttpResponse`] values
//! - `url`: path (with typed parameters) and query parameter patterns
//! - `headers`: header patterns, matched case-insensitively
//! - `multipart`: `multipart/form-data` part patterns
//! - `request_pattern`: the composite [`HttpRequestPattern`]
//! - `response_pattern`: the composite [`HttpResponsePattern`]
//!
//! Path segments, query values, headers and form fields are strings on the
//! wire; they are checked by parsing them through their pattern.

mod headers;
mod message;
mod multipart;
mod request_pattern;
mod response_pattern;
mod url;

pub use headers::HttpHeadersPattern;
pub use message::{HttpRequest, HttpResponse, MultipartPart};
pub use multipart::MultipartPattern;
pub use request_pattern::{HttpRequestPattern, REQUEST_BODY_COLUMN};
pub use response_pattern::{HttpResponsePattern, RESPONSE_BODY_COLUMN};
pub use url::{HttpPathPattern, HttpUrlPattern, PathSegment};

pub(crate) use headers::media_type;
pub(crate) use message::find_header;

use crate::error::ContractError;
use crate::examples::Row;
use crate::pattern::{capped_product, token_pattern, ObjectField, Pattern};
use crate::resolver::Resolver;
use crate::result::MatchResult;
use crate::value::Value;
use indexmap::IndexMap;

/// Match one wire string against a pattern. In mock mode a type token
/// such as `(number)` is accepted when the pattern encompasses it.
pub(crate) fn match_wire_text(pattern: &Pattern, text: &str, resolver: &Resolver) -> MatchResult {
    if resolver.mock_mode() {
        if let Some(token) = token_pattern(text) {
            return pattern.encompasses(&token, resolver, resolver);
        }
    }
    match pattern.parse(text, resolver) {
        Ok(_) => MatchResult::Success,
        Err(_) => resolver.mismatch_text(&pattern.type_name(), &format!("\"{text}\"")),
    }
}

/// Typed value of a wire string, falling back to the raw text
pub(crate) fn wire_value(pattern: &Pattern, text: &str, resolver: &Resolver) -> Value {
    pattern
        .parse(text, resolver)
        .unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Match a string map (query, headers, form fields) against declared fields
pub(crate) fn match_string_map(
    declared: &IndexMap<String, ObjectField>,
    actual: &IndexMap<String, String>,
    open: bool,
    label: &str,
    case_insensitive: bool,
    resolver: &Resolver,
) -> MatchResult {
    let actual_keys: Vec<&str> = actual.keys().map(String::as_str).collect();
    let mut results = resolver.check_keys(
        declared.iter().map(|(k, f)| (k.as_str(), f.optional)),
        &actual_keys,
        open,
        label,
        case_insensitive,
    );
    for (key, field) in declared {
        let found = if case_insensitive {
            find_header(actual, key)
        } else {
            actual.get(key).map(String::as_str)
        };
        if let Some(text) = found {
            results.push(match_wire_text(&field.pattern, text, resolver).breadcrumb(key.as_str()));
        }
    }
    MatchResult::all(results)
}

/// Generated wire strings for a map of declared fields; optional fields
/// are included
pub(crate) fn generate_string_map(
    declared: &IndexMap<String, ObjectField>,
    resolver: &Resolver,
) -> IndexMap<String, String> {
    declared
        .iter()
        .filter(|(_, f)| !(f.optional && f.pattern.leads_to_cycle(resolver)))
        .map(|(k, f)| (k.clone(), f.pattern.generate(resolver).to_wire_string()))
        .collect()
}

/// Variants of a string map: row values become exact, optional fields
/// without a row value are enumerated present and absent
pub(crate) fn string_map_new_based_on(
    declared: &IndexMap<String, ObjectField>,
    row: &Row,
    resolver: &Resolver,
) -> Result<Vec<IndexMap<String, ObjectField>>, ContractError> {
    let mut slots: Vec<Vec<Option<(String, ObjectField)>>> = Vec::with_capacity(declared.len());
    for (key, field) in declared {
        if let Some(cell) = row.field(key) {
            let value = field.pattern.parse(&cell, resolver).map_err(|e| {
                ContractError::InvalidExampleValue {
                    name: key.clone(),
                    value: cell.clone(),
                    reason: e.to_string(),
                }
            })?;
            slots.push(vec![Some((key.clone(), ObjectField::mandatory(Pattern::Exact(value))))]);
            continue;
        }
        let mut options: Vec<Option<(String, ObjectField)>> = field
            .pattern
            .new_based_on(row, resolver)?
            .into_iter()
            .map(|p| Some((key.clone(), ObjectField::mandatory(p))))
            .collect();
        if field.optional {
            options.push(None);
        }
        slots.push(options);
    }
    Ok(capped_product(&slots, resolver.max_combinations())
        .into_iter()
        .map(|combo| combo.into_iter().flatten().collect())
        .collect())
}

/// Variants of a string map that must be rejected: a mandatory field
/// removed, or a value that does not parse under its pattern
pub(crate) fn string_map_negative_based_on(
    declared: &IndexMap<String, ObjectField>,
    row: &Row,
    resolver: &Resolver,
) -> Result<Vec<IndexMap<String, ObjectField>>, ContractError> {
    let Some(base) = string_map_new_based_on(declared, row, resolver)?
        .into_iter()
        .next()
    else {
        return Ok(Vec::new());
    };

    let mut negatives = Vec::new();
    for (key, field) in declared {
        if !field.optional {
            let mut without = base.clone();
            without.shift_remove(key);
            negatives.push(without);
        }
        for bad in wire_negatives(&field.pattern, row, resolver)? {
            let mut mutated = base.clone();
            mutated.insert(key.clone(), ObjectField::mandatory(bad));
            negatives.push(mutated);
        }
    }
    Ok(negatives)
}

/// Negative values for a string-valued position: only those whose wire
/// form fails to parse under the original pattern are kept
pub(crate) fn wire_negatives(
    pattern: &Pattern,
    row: &Row,
    resolver: &Resolver,
) -> Result<Vec<Pattern>, ContractError> {
    Ok(pattern
        .negative_based_on(row, resolver)?
        .into_iter()
        .filter(|negative| match negative {
            Pattern::Exact(value) => pattern.parse(&value.to_wire_string(), resolver).is_err(),
            _ => false,
        })
        .collect())
}

/// Match a message body. Plain-text bodies are parsed through the pattern
/// first, so `10` sent as `text/plain` satisfies a numeric body.
pub(crate) fn match_body(pattern: &Pattern, body: &Value, resolver: &Resolver) -> MatchResult {
    let result = pattern.matches(body, resolver);
    if result.is_success() {
        return result;
    }
    match body {
        Value::String(text) if pattern.parse(text, resolver).is_ok() => MatchResult::Success,
        _ => result,
    }
}

/// Body value as the pattern would read it
pub(crate) fn typed_body(pattern: &Pattern, body: &Value, resolver: &Resolver) -> Value {
    match body {
        Value::String(text) => pattern
            .parse(text, resolver)
            .unwrap_or_else(|_| body.clone()),
        other => other.clone(),
    }
}
