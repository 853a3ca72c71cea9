//! The context threaded through every match and generate call.
//!
//! A [`Resolver`] is copied-with-override rather than mutated. It carries:
//! - named pattern bindings used to resolve deferred references
//! - the [`KeyCheck`] policy for missing and unexpected object keys
//! - a pluggable [`MismatchMessages`] strategy
//! - mock and negative-generation flags
//! - the shared [`FactStore`] holding server-state facts
//! - the set of type aliases currently being expanded (cycle guard)

use crate::error::ContractError;
use crate::pattern::Pattern;
use crate::result::MatchResult;
use crate::value::Value;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Default cap on generated combinations per pattern
pub const DEFAULT_MAX_COMBINATIONS: usize = 64;

// ============================================================================
// Mismatch message strategies
// ============================================================================

/// Wording of mismatch reports. The same matching code produces different
/// wording depending on what the contract is being compared against.
pub trait MismatchMessages: Send + Sync {
    /// Name of the thing being compared with the contract ("request", "stub", ...)
    fn actual_source(&self) -> &str;

    fn mismatch(&self, expected: &str, actual: &str) -> String {
        format!(
            "Contract expected {expected} but {} contained {actual}",
            self.actual_source()
        )
    }

    fn unexpected_key(&self, label: &str, key: &str) -> String {
        format!(
            "{} named \"{key}\" in the {} was not in the specification",
            capitalize(label),
            self.actual_source()
        )
    }

    fn expected_key_missing(&self, label: &str, key: &str) -> String {
        format!(
            "Expected {label} named \"{key}\" was missing from the {}",
            self.actual_source()
        )
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Contract compared with a live request
#[derive(Debug, Default, Clone, Copy)]
pub struct ContractVsRequest;

impl MismatchMessages for ContractVsRequest {
    fn actual_source(&self) -> &str {
        "request"
    }
}

/// Contract compared with a live response
#[derive(Debug, Default, Clone, Copy)]
pub struct ContractVsResponse;

impl MismatchMessages for ContractVsResponse {
    fn actual_source(&self) -> &str {
        "response"
    }
}

/// Contract compared with a registered stub expectation
#[derive(Debug, Default, Clone, Copy)]
pub struct ContractVsStub;

impl MismatchMessages for ContractVsStub {
    fn actual_source(&self) -> &str {
        "stub"
    }
}

/// Contract compared with a documented example
#[derive(Debug, Default, Clone, Copy)]
pub struct ContractVsExample;

impl MismatchMessages for ContractVsExample {
    fn actual_source(&self) -> &str {
        "example"
    }
}

// ============================================================================
// Key check policy
// ============================================================================

/// What to do when a mandatory key is absent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingKeyPolicy {
    #[default]
    Fail,
    Ignore,
}

/// What to do when a key is present but undeclared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnexpectedKeyPolicy {
    #[default]
    Validate,
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyCheck {
    pub missing: MissingKeyPolicy,
    pub unexpected: UnexpectedKeyPolicy,
}

impl KeyCheck {
    pub fn ignoring_unexpected(self) -> Self {
        Self {
            unexpected: UnexpectedKeyPolicy::Ignore,
            ..self
        }
    }

    pub fn ignoring_missing(self) -> Self {
        Self {
            missing: MissingKeyPolicy::Ignore,
            ..self
        }
    }
}

// ============================================================================
// Fact store
// ============================================================================

/// Shared mutable server-state facts (Gherkin-style `FACT` bindings).
/// Cloning the handle shares the underlying map.
#[derive(Clone, Default)]
pub struct FactStore(Arc<RwLock<IndexMap<String, Value>>>);

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.read().get(name).cloned()
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.0.write().insert(name.into(), value);
    }

    pub fn extend(&self, facts: impl IntoIterator<Item = (String, Value)>) {
        self.0.write().extend(facts);
    }

    pub fn snapshot(&self) -> IndexMap<String, Value> {
        self.0.read().clone()
    }

    pub fn clear(&self) {
        self.0.write().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }
}

impl fmt::Debug for FactStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FactStore").field(&*self.0.read()).finish()
    }
}

// ============================================================================
// Resolver
// ============================================================================

#[derive(Clone)]
pub struct Resolver {
    patterns: Arc<HashMap<String, Pattern>>,
    messages: Arc<dyn MismatchMessages>,
    key_check: KeyCheck,
    mock_mode: bool,
    negative: bool,
    facts: FactStore,
    expanding: Vec<String>,
    max_combinations: usize,
}

impl Default for Resolver {
    fn default() -> Self {
        Self {
            patterns: Arc::new(HashMap::new()),
            messages: Arc::new(ContractVsRequest),
            key_check: KeyCheck::default(),
            mock_mode: false,
            negative: false,
            facts: FactStore::new(),
            expanding: Vec::new(),
            max_combinations: DEFAULT_MAX_COMBINATIONS,
        }
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("patterns", &self.patterns.keys().collect::<Vec<_>>())
            .field("messages", &self.messages.actual_source())
            .field("key_check", &self.key_check)
            .field("mock_mode", &self.mock_mode)
            .field("negative", &self.negative)
            .field("expanding", &self.expanding)
            .field("max_combinations", &self.max_combinations)
            .finish()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patterns(patterns: HashMap<String, Pattern>) -> Self {
        Self {
            patterns: Arc::new(patterns),
            ..Self::default()
        }
    }

    /// Copy with additional bindings layered over the existing ones
    pub fn with_more_patterns(&self, patterns: &HashMap<String, Pattern>) -> Self {
        if patterns.is_empty() {
            return self.clone();
        }
        let mut merged = (*self.patterns).clone();
        merged.extend(patterns.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self {
            patterns: Arc::new(merged),
            ..self.clone()
        }
    }

    pub fn with_messages(&self, messages: Arc<dyn MismatchMessages>) -> Self {
        Self {
            messages,
            ..self.clone()
        }
    }

    pub fn with_key_check(&self, key_check: KeyCheck) -> Self {
        Self {
            key_check,
            ..self.clone()
        }
    }

    pub fn with_mock_mode(&self, mock_mode: bool) -> Self {
        Self {
            mock_mode,
            ..self.clone()
        }
    }

    pub fn with_negative(&self, negative: bool) -> Self {
        Self {
            negative,
            ..self.clone()
        }
    }

    pub fn with_facts(&self, facts: FactStore) -> Self {
        Self {
            facts,
            ..self.clone()
        }
    }

    pub fn with_max_combinations(&self, max_combinations: usize) -> Self {
        Self {
            max_combinations: max_combinations.max(1),
            ..self.clone()
        }
    }

    /// Resolve a named pattern binding
    pub fn pattern(&self, name: &str) -> Result<&Pattern, ContractError> {
        self.patterns
            .get(name)
            .ok_or_else(|| ContractError::UnknownPattern(format!("({name})")))
    }

    pub fn patterns(&self) -> &HashMap<String, Pattern> {
        &self.patterns
    }

    pub fn messages(&self) -> &dyn MismatchMessages {
        self.messages.as_ref()
    }

    pub fn key_check(&self) -> KeyCheck {
        self.key_check
    }

    pub fn mock_mode(&self) -> bool {
        self.mock_mode
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn facts(&self) -> &FactStore {
        &self.facts
    }

    pub fn max_combinations(&self) -> usize {
        self.max_combinations
    }

    /// Whether `alias` is already being expanded further up the stack
    pub fn is_expanding(&self, alias: &str) -> bool {
        self.expanding.iter().any(|a| a == alias)
    }

    /// How many times `alias` is on the expansion stack
    pub fn expansion_count(&self, alias: &str) -> usize {
        self.expanding.iter().filter(|a| *a == alias).count()
    }

    /// Copy marking `alias` as mid-expansion
    pub fn entering(&self, alias: &str) -> Self {
        let mut expanding = self.expanding.clone();
        expanding.push(alias.to_string());
        Self {
            expanding,
            ..self.clone()
        }
    }

    /// Failure worded by the active message strategy
    pub fn mismatch(&self, expected: &str, actual: &Value) -> MatchResult {
        MatchResult::failure(self.messages.mismatch(expected, &actual.display_with_type()))
    }

    pub fn mismatch_text(&self, expected: &str, actual: &str) -> MatchResult {
        MatchResult::failure(self.messages.mismatch(expected, actual))
    }

    /// Check declared keys against actual keys.
    ///
    /// `declared` yields `(name, optional)` pairs. Returns one breadcrumbed
    /// failure per missing or unexpected key.
    pub fn check_keys<'a>(
        &self,
        declared: impl IntoIterator<Item = (&'a str, bool)>,
        actual: &[&str],
        open: bool,
        label: &str,
        case_insensitive: bool,
    ) -> Vec<MatchResult> {
        let same = |a: &str, b: &str| {
            if case_insensitive {
                a.eq_ignore_ascii_case(b)
            } else {
                a == b
            }
        };
        let declared: Vec<(&str, bool)> = declared.into_iter().collect();
        let mut results = Vec::new();

        if self.key_check.missing == MissingKeyPolicy::Fail && !self.negative {
            for (name, optional) in &declared {
                if !optional && !actual.iter().any(|k| same(k, name)) {
                    results.push(
                        MatchResult::failure(self.messages.expected_key_missing(label, name))
                            .breadcrumb(*name),
                    );
                }
            }
        }

        if !open && self.key_check.unexpected == UnexpectedKeyPolicy::Validate {
            for key in actual {
                if !declared.iter().any(|(name, _)| same(name, key)) {
                    results.push(
                        MatchResult::failure(self.messages.unexpected_key(label, key))
                            .breadcrumb(*key),
                    );
                }
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_per_strategy() {
        assert_eq!(
            ContractVsRequest.mismatch("number", "\"ten\""),
            "Contract expected number but request contained \"ten\""
        );
        assert_eq!(
            ContractVsStub.unexpected_key("key", "extra"),
            "Key named \"extra\" in the stub was not in the specification"
        );
        assert_eq!(
            ContractVsExample.expected_key_missing("header", "X-Id"),
            "Expected header named \"X-Id\" was missing from the example"
        );
    }

    #[test]
    fn test_copy_with_override_leaves_original() {
        let base = Resolver::new();
        let mock = base.with_mock_mode(true).entering("Node");
        assert!(!base.mock_mode());
        assert!(!base.is_expanding("Node"));
        assert!(mock.mock_mode());
        assert!(mock.is_expanding("Node"));
    }

    #[test]
    fn test_fact_store_is_shared_between_copies() {
        let resolver = Resolver::new();
        let copy = resolver.with_mock_mode(true);
        copy.facts().set("id", Value::integer(10));
        assert_eq!(resolver.facts().get("id"), Some(Value::integer(10)));
        resolver.facts().clear();
        assert!(copy.facts().is_empty());
    }

    #[test]
    fn test_check_keys() {
        let resolver = Resolver::new();
        let results = resolver.check_keys(
            [("id", false), ("name", true)],
            &["extra"],
            false,
            "key",
            false,
        );
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].failures().unwrap().first().path(), "id");
        assert_eq!(results[1].failures().unwrap().first().path(), "extra");

        // Open objects tolerate extra keys; ignore policy skips missing keys
        let lenient = resolver.with_key_check(KeyCheck::default().ignoring_missing());
        assert!(lenient
            .check_keys([("id", false)], &["extra"], true, "key", false)
            .is_empty());
    }

    #[test]
    fn test_unknown_pattern() {
        let err = Resolver::new().pattern("Missing").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Pattern (Missing) is not defined in the specification"
        );
    }
}
