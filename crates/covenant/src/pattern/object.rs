//! JSON object patterns (optional keys, rest wildcard) and dictionaries.

use super::{capped_product, example_pattern, Pattern};
use crate::error::ContractError;
use crate::examples::Row;
use crate::resolver::Resolver;
use crate::result::MatchResult;
use crate::value::Value;
use indexmap::IndexMap;

/// One declared key of an object pattern
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectField {
    pub pattern: Pattern,
    pub optional: bool,
}

impl ObjectField {
    pub fn mandatory(pattern: Pattern) -> Self {
        Self {
            pattern,
            optional: false,
        }
    }

    pub fn optional(pattern: Pattern) -> Self {
        Self {
            pattern,
            optional: true,
        }
    }
}

/// A JSON object shape. When `open` is set, undeclared keys are tolerated
/// (the `...` wildcard); generation never synthesizes them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectPattern {
    pub fields: IndexMap<String, ObjectField>,
    pub open: bool,
    pub type_alias: Option<String>,
}

impl ObjectPattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: impl Into<String>, pattern: Pattern) -> Self {
        self.fields.insert(key.into(), ObjectField::mandatory(pattern));
        self
    }

    pub fn optional_field(mut self, key: impl Into<String>, pattern: Pattern) -> Self {
        self.fields.insert(key.into(), ObjectField::optional(pattern));
        self
    }

    pub fn open(mut self) -> Self {
        self.open = true;
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.type_alias = Some(alias.into());
        self
    }

    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        let Value::Object(actual) = value else {
            return resolver.mismatch(&self.describe(), value);
        };

        let actual_keys: Vec<&str> = actual.keys().map(String::as_str).collect();
        let mut results = resolver.check_keys(
            self.fields
                .iter()
                .map(|(key, field)| (key.as_str(), field.optional)),
            &actual_keys,
            self.open,
            "key",
            false,
        );

        for (key, field) in &self.fields {
            if let Some(actual_value) = actual.get(key) {
                results.push(field.pattern.matches(actual_value, resolver).breadcrumb(key));
            }
        }

        MatchResult::all(results)
    }

    fn describe(&self) -> String {
        self.type_alias
            .as_ref()
            .map(|a| format!("json object ({a})"))
            .unwrap_or_else(|| "json object".to_string())
    }

    pub fn generate(&self, resolver: &Resolver) -> Value {
        let entries = self
            .fields
            .iter()
            .filter(|(_, field)| !(field.optional && field.pattern.leads_to_cycle(resolver)))
            .map(|(key, field)| (key.clone(), field.pattern.generate(resolver)))
            .collect();
        Value::Object(entries)
    }

    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Self>, ContractError> {
        let mut slots: Vec<Vec<Option<(String, ObjectField)>>> = Vec::new();
        for (key, field) in &self.fields {
            if let Some(cell) = row.field(key) {
                let exact = example_pattern(&field.pattern, key, &cell, resolver)?;
                slots.push(vec![Some((key.clone(), ObjectField::mandatory(exact)))]);
                continue;
            }
            let mut options: Vec<Option<(String, ObjectField)>> = if field.optional
                && field.pattern.leads_to_cycle(resolver)
            {
                Vec::new()
            } else {
                field
                    .pattern
                    .new_based_on(row, resolver)?
                    .into_iter()
                    .map(|p| Some((key.clone(), ObjectField::mandatory(p))))
                    .collect()
            };
            if field.optional {
                options.push(None);
            }
            slots.push(options);
        }

        Ok(capped_product(&slots, resolver.max_combinations())
            .into_iter()
            .map(|combo| Self {
                fields: combo.into_iter().flatten().collect(),
                open: self.open,
                type_alias: self.type_alias.clone(),
            })
            .collect())
    }

    /// All optional keys present, and all optional keys omitted
    pub fn compatibility_variants(&self, resolver: &Resolver) -> Vec<Self> {
        let all_present = Self {
            fields: self
                .fields
                .iter()
                .filter(|(_, f)| !f.pattern.leads_to_cycle(resolver))
                .map(|(k, f)| (k.clone(), ObjectField::mandatory(f.pattern.clone())))
                .collect(),
            ..self.clone()
        };
        let all_omitted = Self {
            fields: self
                .fields
                .iter()
                .filter(|(_, f)| !f.optional)
                .map(|(k, f)| (k.clone(), f.clone()))
                .collect(),
            ..self.clone()
        };
        if all_present == all_omitted {
            vec![all_present]
        } else {
            vec![all_present, all_omitted]
        }
    }

    /// Variants violating the contract: a mandatory key dropped, or one
    /// field replaced by one of its own negative variants
    pub fn negative_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Pattern>, ContractError> {
        let positive = self.new_based_on(row, resolver)?;
        let Some(base) = positive.into_iter().next() else {
            return Ok(Vec::new());
        };

        let mut negatives = Vec::new();
        for (key, field) in &self.fields {
            if !field.optional {
                let mut without = base.clone();
                without.fields.shift_remove(key);
                negatives.push(Pattern::Object(without));
            }
            if field.pattern.leads_to_cycle(resolver) {
                continue;
            }
            for negative in field.pattern.negative_based_on(row, resolver)? {
                let mut mutated = base.clone();
                mutated
                    .fields
                    .insert(key.clone(), ObjectField::mandatory(negative));
                negatives.push(Pattern::Object(mutated));
            }
        }
        Ok(negatives)
    }

    /// Generalize an example object into the class of objects with the same keys
    pub fn generalize(&self, value: &Value, resolver: &Resolver) -> Pattern {
        let Value::Object(actual) = value else {
            return Pattern::Object(self.clone());
        };
        let fields = actual
            .iter()
            .map(|(key, v)| {
                let pattern = match self.fields.get(key) {
                    Some(field) => field.pattern.generalize(v, resolver),
                    None => Pattern::Exact(v.clone()),
                };
                (key.clone(), ObjectField::mandatory(pattern))
            })
            .collect();
        Pattern::Object(Self {
            fields,
            open: false,
            type_alias: self.type_alias.clone(),
        })
    }
}

/// An object with arbitrary keys of one type and values of one type
/// (OpenAPI `additionalProperties`)
#[derive(Debug, Clone, PartialEq)]
pub struct DictionaryPattern {
    pub key: Box<Pattern>,
    pub value: Box<Pattern>,
}

impl DictionaryPattern {
    pub fn new(key: Pattern, value: Pattern) -> Self {
        Self {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        let Value::Object(actual) = value else {
            return resolver.mismatch("json object", value);
        };
        MatchResult::all(actual.iter().map(|(k, v)| {
            let key_result = match self.key.parse(k, resolver) {
                Ok(_) => MatchResult::Success,
                Err(_) => resolver.mismatch_text(&format!("key of type {}", self.key.type_name()), &format!("\"{k}\"")),
            };
            key_result
                .and_then(|| self.value.matches(v, resolver))
                .breadcrumb(k.as_str())
        }))
    }

    pub fn generate(&self, resolver: &Resolver) -> Value {
        let key = self.key.generate(resolver).to_wire_string();
        let mut entries = IndexMap::new();
        entries.insert(key, self.value.generate(resolver));
        Value::Object(entries)
    }
}
