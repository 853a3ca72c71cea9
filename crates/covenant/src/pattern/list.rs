//! Homogeneous lists and positional tuples.

use super::{capped_product, Pattern};
use crate::error::ContractError;
use crate::examples::Row;
use crate::resolver::Resolver;
use crate::result::MatchResult;
use crate::value::Value;
use rand::Rng;

/// A JSON array whose every element matches `element`
#[derive(Debug, Clone, PartialEq)]
pub struct ListPattern {
    pub element: Box<Pattern>,
    pub type_alias: Option<String>,
}

impl ListPattern {
    pub fn new(element: Pattern) -> Self {
        Self {
            element: Box::new(element),
            type_alias: None,
        }
    }

    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        let Value::Array(items) = value else {
            return resolver.mismatch("json array", value);
        };
        MatchResult::all(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| self.element.matches(item, resolver).breadcrumb(format!("[{i}]"))),
        )
    }

    /// Between one and three elements; an element type that refers back to
    /// a type already being expanded produces an empty list
    pub fn generate(&self, resolver: &Resolver) -> Value {
        if self.element.leads_to_cycle(resolver) {
            return Value::Array(Vec::new());
        }
        let count = rand::thread_rng().gen_range(1..=3);
        Value::Array((0..count).map(|_| self.element.generate(resolver)).collect())
    }

    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Pattern>, ContractError> {
        if self.element.leads_to_cycle(resolver) {
            return Ok(vec![Pattern::List(self.clone())]);
        }
        Ok(self
            .element
            .new_based_on(row, resolver)?
            .into_iter()
            .map(|element| {
                Pattern::List(Self {
                    element: Box::new(element),
                    type_alias: self.type_alias.clone(),
                })
            })
            .collect())
    }

    pub fn negative_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Pattern>, ContractError> {
        let mut negatives = vec![Pattern::null()];
        if !self.element.leads_to_cycle(resolver) {
            negatives.extend(
                self.element
                    .negative_based_on(row, resolver)?
                    .into_iter()
                    .map(|element| Pattern::Tuple(vec![element])),
            );
        }
        Ok(negatives)
    }

    /// A literal list generalizes to a tuple of the element type, one per
    /// example item, so the stub keeps the example's length
    pub fn generalize(&self, value: &Value, resolver: &Resolver) -> Pattern {
        match value {
            Value::Array(items) => Pattern::Tuple(
                items
                    .iter()
                    .map(|item| self.element.generalize(item, resolver))
                    .collect(),
            ),
            _ => Pattern::List(self.clone()),
        }
    }
}

/// Positional match: one pattern per element, lengths must agree
pub(super) fn tuple_matches(items: &[Pattern], value: &Value, resolver: &Resolver) -> MatchResult {
    let Value::Array(actual) = value else {
        return resolver.mismatch("json array", value);
    };
    if actual.len() != items.len() {
        return resolver.mismatch_text(
            &format!("json array of length {}", items.len()),
            &format!("json array of length {}", actual.len()),
        );
    }
    MatchResult::all(
        items
            .iter()
            .zip(actual)
            .enumerate()
            .map(|(i, (pattern, item))| pattern.matches(item, resolver).breadcrumb(format!("[{i}]"))),
    )
}

pub(super) fn tuple_new_based_on(
    items: &[Pattern],
    row: &Row,
    resolver: &Resolver,
) -> Result<Vec<Pattern>, ContractError> {
    let slots = items
        .iter()
        .map(|item| item.new_based_on(row, resolver))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(capped_product(&slots, resolver.max_combinations())
        .into_iter()
        .map(Pattern::Tuple)
        .collect())
}
