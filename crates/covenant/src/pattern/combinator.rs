//! Union and intersection combinators.
//!
//! - [`AnyPattern`]: exactly one of the options (OpenAPI `oneOf`, nullable types)
//! - [`AnyOfPattern`]: one or more of the options (OpenAPI `anyOf`)
//! - [`AllOfPattern`]: every option at once (OpenAPI `allOf`)

use super::{ObjectField, ObjectPattern, Pattern, ScalarPattern};
use crate::error::ContractError;
use crate::examples::Row;
use crate::resolver::Resolver;
use crate::result::MatchResult;
use crate::value::Value;
use indexmap::IndexMap;
use rand::seq::SliceRandom;
use std::collections::HashSet;

/// OpenAPI discriminator: the value of `property` selects the option
#[derive(Debug, Clone, PartialEq)]
pub struct Discriminator {
    pub property: String,
    pub mapping: IndexMap<String, Pattern>,
}

// ============================================================================
// AnyPattern
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct AnyPattern {
    pub patterns: Vec<Pattern>,
    pub type_alias: Option<String>,
    pub discriminator: Option<Discriminator>,
}

impl AnyPattern {
    pub fn new(patterns: Vec<Pattern>) -> Self {
        Self {
            patterns,
            type_alias: None,
            discriminator: None,
        }
    }

    pub fn type_name(&self) -> String {
        if let Some(alias) = &self.type_alias {
            return format!("({alias})");
        }
        if let [single, Pattern::Scalar(ScalarPattern::Null)] = self.patterns.as_slice() {
            return format!("{}?", single.type_name());
        }
        self.patterns
            .iter()
            .map(Pattern::type_name)
            .collect::<Vec<_>>()
            .join(" or ")
    }

    fn is_nullable(&self) -> bool {
        self.patterns.iter().any(is_null_pattern)
    }

    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        if let Some(discriminator) = &self.discriminator {
            return discriminated_match(discriminator, value, resolver);
        }

        let mut failures = Vec::with_capacity(self.patterns.len());
        for pattern in &self.patterns {
            match pattern.matches(value, resolver) {
                MatchResult::Success => return MatchResult::Success,
                failure => failures.push(failure),
            }
        }

        // A nullable type reports the failure of its non-null option
        let mut non_null: Vec<MatchResult> = self
            .patterns
            .iter()
            .zip(failures)
            .filter(|(p, _)| !is_null_pattern(p))
            .map(|(_, f)| f)
            .collect();
        if non_null.len() == 1 {
            if let Some(only) = non_null.pop() {
                return only;
            }
        }
        resolver.mismatch(&self.type_name(), value)
    }

    pub fn generate(&self, resolver: &Resolver) -> Value {
        if let Some(discriminator) = &self.discriminator {
            return discriminated_generate(discriminator, resolver);
        }
        let candidates: Vec<&Pattern> = self
            .patterns
            .iter()
            .filter(|p| !p.leads_to_cycle(resolver))
            .collect();
        // Prefer a non-null option so nullable fields carry data
        let preferred: Vec<&Pattern> = candidates
            .iter()
            .copied()
            .filter(|p| !is_null_pattern(p))
            .collect();
        let pool = if preferred.is_empty() { &candidates } else { &preferred };
        match pool.choose(&mut rand::thread_rng()) {
            Some(pattern) => pattern.generate(resolver),
            None => Value::Null,
        }
    }

    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Pattern>, ContractError> {
        let mut variants = Vec::new();
        match &self.discriminator {
            Some(discriminator) => {
                for (tag, option) in &discriminator.mapping {
                    if option.leads_to_cycle(resolver) {
                        continue;
                    }
                    for variant in option.new_based_on(row, resolver)? {
                        variants.push(pin_discriminator(variant, &discriminator.property, tag, resolver));
                    }
                }
            }
            None => {
                for option in self.patterns.iter().filter(|p| !p.leads_to_cycle(resolver)) {
                    variants.extend(option.new_based_on(row, resolver)?);
                }
            }
        }
        if variants.is_empty() {
            variants.push(Pattern::null());
        }
        Ok(variants)
    }

    /// Negative variants of each option that no option accepts
    pub fn negative_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Pattern>, ContractError> {
        let positive = resolver.with_negative(false);
        let mut negatives = Vec::new();
        if !self.is_nullable() {
            negatives.push(Pattern::null());
        }
        for option in &self.patterns {
            if option.leads_to_cycle(resolver) {
                continue;
            }
            for negative in option.negative_based_on(row, resolver)? {
                let sample = negative.generate(&positive);
                if self.matches(&sample, &positive).is_failure() && !negatives.contains(&negative) {
                    negatives.push(negative);
                }
            }
        }
        Ok(negatives)
    }

    /// First option able to parse the text wins
    pub fn parse(&self, text: &str, resolver: &Resolver) -> Result<Value, ContractError> {
        let mut last_error = None;
        for pattern in &self.patterns {
            match pattern.parse(text, resolver) {
                Ok(value) => return Ok(value),
                Err(e) => last_error = Some(e),
            }
        }
        Err(ContractError::InvalidExampleValue {
            name: self.type_name(),
            value: text.to_string(),
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no options to parse with".to_string()),
        })
    }
}

fn is_null_pattern(pattern: &Pattern) -> bool {
    matches!(
        pattern,
        Pattern::Scalar(ScalarPattern::Null) | Pattern::Exact(Value::Null)
    )
}

/// Generate from a mapped option and stamp its tag on the discriminator property
fn discriminated_generate(discriminator: &Discriminator, resolver: &Resolver) -> Value {
    let options: Vec<(&String, &Pattern)> = discriminator
        .mapping
        .iter()
        .filter(|(_, p)| !p.leads_to_cycle(resolver))
        .collect();
    let Some((tag, pattern)) = options.choose(&mut rand::thread_rng()) else {
        return Value::Null;
    };
    match pattern.generate(resolver) {
        Value::Object(mut entries) => {
            entries.insert(discriminator.property.clone(), Value::String((*tag).clone()));
            Value::Object(entries)
        }
        other => other,
    }
}

/// Object variants get the discriminator property fixed to `tag`
fn pin_discriminator(variant: Pattern, property: &str, tag: &str, resolver: &Resolver) -> Pattern {
    let resolved = match variant.resolve(resolver) {
        Ok(Pattern::Object(object)) => Some(object.clone()),
        _ => None,
    };
    let Some(mut pinned) = resolved else {
        return variant;
    };
    pinned.fields.insert(
        property.to_string(),
        ObjectField::mandatory(Pattern::Exact(Value::String(tag.to_string()))),
    );
    Pattern::Object(pinned)
}

fn discriminated_match(discriminator: &Discriminator, value: &Value, resolver: &Resolver) -> MatchResult {
    let Value::Object(entries) = value else {
        return resolver.mismatch("json object", value);
    };
    let property = discriminator.property.as_str();
    let Some(tag) = entries.get(property) else {
        return MatchResult::failure(resolver.messages().expected_key_missing("key", property))
            .breadcrumb(property);
    };
    let selected = tag
        .as_str()
        .and_then(|t| discriminator.mapping.get(t));
    match selected {
        Some(pattern) => pattern.matches(value, resolver),
        None => {
            let allowed = discriminator
                .mapping
                .keys()
                .map(|k| format!("\"{k}\""))
                .collect::<Vec<_>>()
                .join(", ");
            resolver
                .mismatch(&format!("one of {allowed}"), tag)
                .breadcrumb(property)
        }
    }
}

// ============================================================================
// AnyOfPattern
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct AnyOfPattern {
    pub patterns: Vec<Pattern>,
    pub type_alias: Option<String>,
}

impl AnyOfPattern {
    pub fn new(patterns: Vec<Pattern>) -> Self {
        Self {
            patterns,
            type_alias: None,
        }
    }

    /// Succeeds when at least one option matches. An object may combine the
    /// keys of several object options, as long as every key it carries is
    /// declared by one of the options it satisfies.
    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        if self
            .patterns
            .iter()
            .any(|p| p.matches(value, resolver).is_success())
        {
            return MatchResult::Success;
        }

        if let Value::Object(entries) = value {
            let lenient = resolver.with_key_check(resolver.key_check().ignoring_unexpected());
            let mut declared: HashSet<&str> = HashSet::new();
            let mut any_open = false;
            let mut satisfied = 0;
            for pattern in &self.patterns {
                let Ok(Pattern::Object(object)) = pattern.resolve(resolver) else {
                    continue;
                };
                if object.matches(value, &lenient).is_success() {
                    satisfied += 1;
                    any_open |= object.open;
                    declared.extend(object.fields.keys().map(String::as_str));
                }
            }
            if satisfied > 0 && (any_open || entries.keys().all(|k| declared.contains(k.as_str()))) {
                return MatchResult::Success;
            }
        }

        let expected = self
            .type_alias
            .as_ref()
            .map(|a| format!("({a})"))
            .unwrap_or_else(|| "any of the listed schemas".to_string());
        resolver.mismatch(&expected, value)
    }

    pub fn generate(&self, resolver: &Resolver) -> Value {
        let candidates: Vec<&Pattern> = self
            .patterns
            .iter()
            .filter(|p| !p.leads_to_cycle(resolver))
            .collect();
        match candidates.choose(&mut rand::thread_rng()) {
            Some(pattern) => pattern.generate(resolver),
            None => Value::Null,
        }
    }

    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Pattern>, ContractError> {
        let mut variants = Vec::new();
        for option in self.patterns.iter().filter(|p| !p.leads_to_cycle(resolver)) {
            variants.extend(option.new_based_on(row, resolver)?);
        }
        if variants.is_empty() {
            variants.push(Pattern::null());
        }
        Ok(variants)
    }
}

// ============================================================================
// AllOfPattern
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct AllOfPattern {
    pub patterns: Vec<Pattern>,
    pub type_alias: Option<String>,
}

impl AllOfPattern {
    pub fn new(patterns: Vec<Pattern>) -> Self {
        Self {
            patterns,
            type_alias: None,
        }
    }

    /// When every option is (or resolves to) an object, the single object
    /// pattern carrying the union of their keys
    pub fn merged_object(&self, resolver: &Resolver) -> Option<Pattern> {
        let mut merged = ObjectPattern {
            type_alias: self.type_alias.clone(),
            ..Default::default()
        };
        for option in &self.patterns {
            let object = match option.resolve(resolver).ok()? {
                Pattern::Object(object) => object.clone(),
                Pattern::AllOf(nested) => match nested.merged_object(resolver)? {
                    Pattern::Object(object) => object,
                    _ => return None,
                },
                _ => return None,
            };
            merged.open |= object.open;
            for (key, field) in object.fields {
                match merged.fields.get_mut(&key) {
                    // A key mandatory in any part is mandatory in the whole
                    Some(existing) => existing.optional &= field.optional,
                    None => {
                        merged.fields.insert(key, field);
                    }
                }
            }
        }
        Some(Pattern::Object(merged))
    }

    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        match self.merged_object(resolver) {
            Some(merged) => merged.matches(value, resolver),
            None => MatchResult::all(self.patterns.iter().map(|p| p.matches(value, resolver))),
        }
    }

    pub fn generate(&self, resolver: &Resolver) -> Value {
        match self.merged_object(resolver) {
            Some(merged) => merged.generate(resolver),
            None => self
                .patterns
                .first()
                .map(|p| p.generate(resolver))
                .unwrap_or(Value::Null),
        }
    }

    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Pattern>, ContractError> {
        match self.merged_object(resolver) {
            Some(merged) => merged.new_based_on(row, resolver),
            None => Ok(vec![Pattern::AllOf(self.clone())]),
        }
    }

    pub fn negative_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Pattern>, ContractError> {
        match self.merged_object(resolver) {
            Some(merged) => merged.negative_based_on(row, resolver),
            None => Ok(vec![Pattern::null()]),
        }
    }
}
