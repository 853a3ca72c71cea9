//! Structural pattern type system.
//!
//! A [`Pattern`] is a typed matcher and generator for one value shape. All
//! variants implement the same contract:
//!
//! - `matches(value, resolver)`: pure check returning a breadcrumbed [`MatchResult`]
//! - `generate(resolver)`: produces a value that `matches` accepts (outside
//!   negative mode)
//! - `new_based_on(row, resolver)`: structurally narrowed variants, with
//!   example values from the row substituted as exact values
//! - `encompasses(other, ..)`: subtyping; succeeds iff every value matching
//!   `other` also matches `self`
//! - `parse(text, resolver)`: typed value from a wire string
//!
//! ## Module Structure
//!
//! - `scalar`: string/number/boolean/null and formatted string leaves
//! - `object`: JSON objects (optional keys, rest wildcard) and dictionaries
//! - `list`: homogeneous lists and positional tuples
//! - `xml`: XML node shapes
//! - `combinator`: `Any` (oneOf), `AnyOf` and `AllOf`
//! - `encompass`: the subtyping relation
//! - `grammar`: building patterns from type tokens and JSON documents
//! - `combinations`: bounded cartesian products

mod combinations;
mod combinator;
mod encompass;
mod grammar;
mod list;
mod object;
mod scalar;
mod xml;

#[cfg(test)]
mod tests;

pub use combinations::capped_product;
pub use combinator::{AllOfPattern, AnyOfPattern, AnyPattern, Discriminator};
pub use grammar::{parse_pattern, token_pattern};
pub use list::ListPattern;
pub use object::{DictionaryPattern, ObjectField, ObjectPattern};
pub use scalar::{NumberConstraints, ScalarPattern, StringConstraints};
pub use xml::{XmlChildPattern, XmlOccurrence, XmlPattern};

use crate::error::ContractError;
use crate::examples::Row;
use crate::resolver::Resolver;
use crate::result::MatchResult;
use crate::value::Value;
use rand::Rng;

/// A typed matcher and generator for one structural value shape
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Scalar(ScalarPattern),
    /// Matches any value
    Anything,
    /// Matches an absent (or empty) payload
    NoBody,
    /// Literal equality
    Exact(Value),
    /// Named reference resolved lazily through the resolver's bindings
    Deferred(String),
    Object(ObjectPattern),
    Dictionary(DictionaryPattern),
    List(ListPattern),
    Tuple(Vec<Pattern>),
    Xml(XmlPattern),
    /// Union (OpenAPI `oneOf`, nullable types)
    Any(AnyPattern),
    /// OpenAPI `anyOf`
    AnyOf(AnyOfPattern),
    /// Intersection (OpenAPI `allOf`)
    AllOf(AllOfPattern),
}

impl Pattern {
    pub fn string() -> Self {
        Pattern::Scalar(ScalarPattern::String(StringConstraints::default()))
    }

    pub fn number() -> Self {
        Pattern::Scalar(ScalarPattern::Number(NumberConstraints::default()))
    }

    pub fn integer() -> Self {
        Pattern::Scalar(ScalarPattern::Number(NumberConstraints {
            integer: true,
            ..Default::default()
        }))
    }

    pub fn boolean() -> Self {
        Pattern::Scalar(ScalarPattern::Boolean)
    }

    pub fn null() -> Self {
        Pattern::Scalar(ScalarPattern::Null)
    }

    pub fn exact(value: impl Into<Value>) -> Self {
        Pattern::Exact(value.into())
    }

    pub fn deferred(name: impl Into<String>) -> Self {
        let name = name.into();
        let bare = name
            .strip_prefix('(')
            .and_then(|n| n.strip_suffix(')'))
            .map(str::to_string)
            .unwrap_or(name);
        Pattern::Deferred(bare)
    }

    pub fn list_of(element: Pattern) -> Self {
        Pattern::List(ListPattern::new(element))
    }

    /// `T?`: the pattern or null
    pub fn nullable(pattern: Pattern) -> Self {
        Pattern::Any(AnyPattern::new(vec![pattern, Pattern::null()]))
    }

    /// Short description used in mismatch messages
    pub fn type_name(&self) -> String {
        match self {
            Pattern::Scalar(scalar) => scalar.type_name().to_string(),
            Pattern::Anything => "anything".to_string(),
            Pattern::NoBody => "no body".to_string(),
            Pattern::Exact(value) => value.display_with_type(),
            Pattern::Deferred(name) => format!("({name})"),
            Pattern::Object(object) => object
                .type_alias
                .as_ref()
                .map(|a| format!("({a})"))
                .unwrap_or_else(|| "json object".to_string()),
            Pattern::Dictionary(_) => "json object".to_string(),
            Pattern::List(list) => list
                .type_alias
                .as_ref()
                .map(|a| format!("({a})"))
                .unwrap_or_else(|| format!("list of {}", list.element.type_name())),
            Pattern::Tuple(_) => "json array".to_string(),
            Pattern::Xml(xml) => format!("xml node <{}>", xml.name),
            Pattern::Any(any) => any.type_name(),
            Pattern::AnyOf(any_of) => any_of
                .type_alias
                .as_ref()
                .map(|a| format!("({a})"))
                .unwrap_or_else(|| "any of the listed schemas".to_string()),
            Pattern::AllOf(all_of) => all_of
                .type_alias
                .as_ref()
                .map(|a| format!("({a})"))
                .unwrap_or_else(|| "all of the listed schemas".to_string()),
        }
    }

    /// Follow deferred references to a concrete pattern
    pub fn resolve<'a>(&'a self, resolver: &'a Resolver) -> Result<&'a Pattern, ContractError> {
        let mut current = self;
        let mut seen: Vec<&str> = Vec::new();
        while let Pattern::Deferred(name) = current {
            if seen.contains(&name.as_str()) {
                return Err(ContractError::malformed(format!(
                    "({name}) is defined only in terms of itself"
                )));
            }
            seen.push(name.as_str());
            current = resolver.pattern(name)?;
        }
        Ok(current)
    }

    /// Whether this position refers straight back to a type already being
    /// expanded, so generating it would recurse forever
    pub fn leads_to_cycle(&self, resolver: &Resolver) -> bool {
        match self {
            Pattern::Deferred(name) => resolver.is_expanding(name),
            Pattern::Any(any) => any.patterns.iter().all(|p| p.leads_to_cycle(resolver)),
            _ => false,
        }
    }

    // ========================================================================
    // matches
    // ========================================================================

    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        if resolver.mock_mode() {
            if let Some(token) = value.as_str().and_then(token_pattern) {
                return self.encompasses(&token, resolver, resolver);
            }
        }

        match self {
            Pattern::Scalar(scalar) => scalar.matches(value, resolver),
            Pattern::Anything => MatchResult::Success,
            Pattern::NoBody => match value {
                Value::Empty => MatchResult::Success,
                Value::String(s) if s.is_empty() => MatchResult::Success,
                other => resolver.mismatch("no body", other),
            },
            Pattern::Exact(expected) => {
                if values_equal(expected, value) {
                    MatchResult::Success
                } else {
                    resolver.mismatch(&expected.display_with_type(), value)
                }
            }
            Pattern::Deferred(name) => match resolver.pattern(name) {
                Ok(pattern) => pattern.matches(value, resolver),
                Err(e) => MatchResult::failure(e.to_string()),
            },
            Pattern::Object(object) => object.matches(value, resolver),
            Pattern::Dictionary(dictionary) => dictionary.matches(value, resolver),
            Pattern::List(list) => list.matches(value, resolver),
            Pattern::Tuple(items) => list::tuple_matches(items, value, resolver),
            Pattern::Xml(xml) => xml.matches(value, resolver),
            Pattern::Any(any) => any.matches(value, resolver),
            Pattern::AnyOf(any_of) => any_of.matches(value, resolver),
            Pattern::AllOf(all_of) => all_of.matches(value, resolver),
        }
    }

    // ========================================================================
    // generate
    // ========================================================================

    pub fn generate(&self, resolver: &Resolver) -> Value {
        match self {
            Pattern::Scalar(scalar) => scalar.generate(resolver),
            Pattern::Anything => Value::String(random_word(8)),
            Pattern::NoBody => Value::Empty,
            Pattern::Exact(value) => value.clone(),
            Pattern::Deferred(name) => {
                if resolver.is_expanding(name) {
                    // Terminal value: recursion stops here
                    return Value::Null;
                }
                match resolver.pattern(name) {
                    Ok(pattern) => pattern.generate(&resolver.entering(name)),
                    Err(_) => Value::Null,
                }
            }
            Pattern::Object(object) => object.generate(resolver),
            Pattern::Dictionary(dictionary) => dictionary.generate(resolver),
            Pattern::List(list) => list.generate(resolver),
            Pattern::Tuple(items) => {
                Value::Array(items.iter().map(|p| p.generate(resolver)).collect())
            }
            Pattern::Xml(xml) => Value::Xml(xml.generate(resolver)),
            Pattern::Any(any) => any.generate(resolver),
            Pattern::AnyOf(any_of) => any_of.generate(resolver),
            Pattern::AllOf(all_of) => all_of.generate(resolver),
        }
    }

    // ========================================================================
    // newBasedOn
    // ========================================================================

    /// Narrowed variants of this pattern for test and stub generation.
    ///
    /// Values present in `row` replace the fields they name with exact-value
    /// patterns. Optional fields without a row value are enumerated both
    /// present and absent; the total is capped by the resolver.
    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Pattern>, ContractError> {
        let variants = match self {
            Pattern::Scalar(_)
            | Pattern::Anything
            | Pattern::NoBody
            | Pattern::Exact(_)
            | Pattern::Dictionary(_) => vec![self.clone()],
            Pattern::Deferred(name) => {
                if resolver.is_expanding(name) {
                    return Ok(vec![self.clone()]);
                }
                let resolved = resolver.pattern(name)?.clone();
                resolved.new_based_on(row, &resolver.entering(name))?
            }
            Pattern::Object(object) => object
                .new_based_on(row, resolver)?
                .into_iter()
                .map(Pattern::Object)
                .collect(),
            Pattern::List(list) => list.new_based_on(row, resolver)?,
            Pattern::Tuple(items) => list::tuple_new_based_on(items, row, resolver)?,
            Pattern::Xml(xml) => xml
                .new_based_on(row, resolver)?
                .into_iter()
                .map(Pattern::Xml)
                .collect(),
            Pattern::Any(any) => any.new_based_on(row, resolver)?,
            Pattern::AnyOf(any_of) => any_of.new_based_on(row, resolver)?,
            Pattern::AllOf(all_of) => all_of.new_based_on(row, resolver)?,
        };
        Ok(truncate(variants, resolver.max_combinations()))
    }

    /// The two extremes used for backward-compatibility checks: every
    /// optional field present, and every optional field omitted.
    pub fn compatibility_variants(&self, resolver: &Resolver) -> Vec<Pattern> {
        match self {
            Pattern::Object(object) => object
                .compatibility_variants(resolver)
                .into_iter()
                .map(Pattern::Object)
                .collect(),
            Pattern::Deferred(name) if !resolver.is_expanding(name) => {
                match resolver.pattern(name) {
                    Ok(pattern) => pattern.compatibility_variants(&resolver.entering(name)),
                    Err(_) => vec![self.clone()],
                }
            }
            Pattern::Any(any) => any
                .patterns
                .iter()
                .flat_map(|p| p.compatibility_variants(resolver))
                .collect(),
            _ => vec![self.clone()],
        }
    }

    /// Variants that a conforming implementation must reject: mandatory
    /// keys removed, values of the wrong type, nulls where not nullable.
    pub fn negative_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Pattern>, ContractError> {
        let variants = match self {
            Pattern::Scalar(scalar) => scalar
                .negative_values(resolver)
                .into_iter()
                .map(Pattern::Exact)
                .collect(),
            Pattern::Exact(value) => {
                let mut negatives = Vec::new();
                if !matches!(value, Value::Null) {
                    negatives.push(Pattern::null());
                }
                negatives
            }
            Pattern::Anything | Pattern::NoBody | Pattern::Dictionary(_) => Vec::new(),
            Pattern::Deferred(name) => {
                if resolver.is_expanding(name) {
                    return Ok(Vec::new());
                }
                let resolved = resolver.pattern(name)?.clone();
                resolved.negative_based_on(row, &resolver.entering(name))?
            }
            Pattern::Object(object) => object.negative_based_on(row, resolver)?,
            Pattern::List(list) => list.negative_based_on(row, resolver)?,
            Pattern::Tuple(_) => vec![Pattern::null()],
            Pattern::Xml(_) => Vec::new(),
            Pattern::Any(any) => any.negative_based_on(row, resolver)?,
            Pattern::AnyOf(_) => vec![Pattern::null()],
            Pattern::AllOf(all_of) => all_of.negative_based_on(row, resolver)?,
        };
        Ok(truncate(variants, resolver.max_combinations()))
    }

    // ========================================================================
    // encompasses
    // ========================================================================

    /// Subtyping check: succeeds iff every value matching `other` also
    /// matches `self`
    pub fn encompasses(
        &self,
        other: &Pattern,
        this_resolver: &Resolver,
        other_resolver: &Resolver,
    ) -> MatchResult {
        encompass::encompasses(self, other, this_resolver, other_resolver)
    }

    // ========================================================================
    // parse
    // ========================================================================

    /// Typed value from a wire string, e.g. `"10"` becomes a number for a
    /// numeric pattern
    pub fn parse(&self, text: &str, resolver: &Resolver) -> Result<Value, ContractError> {
        let invalid = |reason: String| ContractError::InvalidExampleValue {
            name: self.type_name(),
            value: text.to_string(),
            reason,
        };
        let value = match self {
            Pattern::Scalar(scalar) => scalar.parse(text).map_err(invalid)?,
            Pattern::Anything => Value::parse_payload(text),
            Pattern::NoBody => {
                if text.trim().is_empty() {
                    Value::Empty
                } else {
                    return Err(invalid("expected no body".to_string()));
                }
            }
            Pattern::Exact(expected) => {
                if expected.to_wire_string() == text {
                    expected.clone()
                } else if let Value::String(_) = expected {
                    Value::String(text.to_string())
                } else {
                    Value::parse_payload(text)
                }
            }
            Pattern::Deferred(_) => {
                let resolved = self.resolve(resolver)?.clone();
                return resolved.parse(text, resolver);
            }
            Pattern::Object(_)
            | Pattern::Dictionary(_)
            | Pattern::List(_)
            | Pattern::Tuple(_)
            | Pattern::AnyOf(_)
            | Pattern::AllOf(_) => Value::parse_json(text)?,
            Pattern::Xml(_) => Value::Xml(crate::value::XmlNode::parse(text)?),
            Pattern::Any(any) => return any.parse(text, resolver),
        };

        match self.matches(&value, resolver) {
            MatchResult::Success => Ok(value),
            MatchResult::Failure(failures) => Err(invalid(failures.to_report())),
        }
    }

    /// Pattern describing the class of values shaped like `value`.
    ///
    /// Used when registering a stub: literal scalars generalize to the
    /// contract's type at that position, pattern tokens such as `"(number)"`
    /// become the pattern they name, and objects keep exactly the keys the
    /// example carried.
    pub fn generalize(&self, value: &Value, resolver: &Resolver) -> Pattern {
        if let Some(token) = value.as_str().and_then(token_pattern) {
            return token;
        }
        match self {
            Pattern::Scalar(_) | Pattern::NoBody | Pattern::Exact(_) | Pattern::Dictionary(_) => {
                self.clone()
            }
            Pattern::Anything => Pattern::Exact(value.clone()),
            Pattern::Deferred(name) => match resolver.pattern(name) {
                Ok(pattern) => pattern.generalize(value, resolver),
                Err(_) => self.clone(),
            },
            Pattern::Object(object) => object.generalize(value, resolver),
            Pattern::List(list) => list.generalize(value, resolver),
            Pattern::Tuple(items) => match value {
                Value::Array(values) if values.len() == items.len() => Pattern::Tuple(
                    items
                        .iter()
                        .zip(values)
                        .map(|(p, v)| p.generalize(v, resolver))
                        .collect(),
                ),
                _ => self.clone(),
            },
            Pattern::Xml(_) => Pattern::Exact(value.clone()),
            Pattern::Any(any) => any
                .patterns
                .iter()
                .find(|p| p.matches(value, resolver).is_success())
                .map(|p| p.generalize(value, resolver))
                .unwrap_or_else(|| self.clone()),
            Pattern::AnyOf(_) => self.clone(),
            Pattern::AllOf(all_of) => match all_of.merged_object(resolver) {
                Some(merged) => merged.generalize(value, resolver),
                None => self.clone(),
            },
        }
    }
}

/// Equality with numeric leniency (`10` equals `10.0`)
pub(crate) fn values_equal(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| values_equal(v, other)))
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Empty, Value::String(s)) | (Value::String(s), Value::Empty) => s.is_empty(),
        _ => expected == actual,
    }
}

fn truncate(mut variants: Vec<Pattern>, max: usize) -> Vec<Pattern> {
    variants.truncate(max.max(1));
    variants
}

/// Parse an example cell into an exact-value pattern, validating it against
/// the pattern it replaces
pub(crate) fn example_pattern(
    pattern: &Pattern,
    key: &str,
    cell: &str,
    resolver: &Resolver,
) -> Result<Pattern, ContractError> {
    pattern
        .parse(cell, resolver)
        .map(Pattern::Exact)
        .map_err(|e| ContractError::InvalidExampleValue {
            name: key.to_string(),
            value: cell.to_string(),
            reason: e.to_string(),
        })
}

pub(crate) fn random_word(len: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}
