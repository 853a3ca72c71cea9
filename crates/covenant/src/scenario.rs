//! One documented request/response case of a contract.
//!
//! A [`Scenario`] is read-only once built. Test and stub generation produce
//! specialized copies through [`Scenario::new_based_on`] and
//! [`Scenario::negative_based_on`]; the original is never changed.

use crate::error::ContractError;
use crate::examples::{Examples, Row};
use crate::http::{HttpRequest, HttpRequestPattern, HttpResponse, HttpResponsePattern};
use crate::pattern::{token_pattern, values_equal, Pattern};
use crate::resolver::{ContractVsResponse, ContractVsStub, Resolver};
use crate::result::{FailureReason, MatchResult};
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: String,
    pub request: HttpRequestPattern,
    pub response: HttpResponsePattern,
    /// Server-state facts this case expects. A string value that is a type
    /// token such as `"(number)"` accepts any fact of that type.
    pub expected_facts: IndexMap<String, Value>,
    pub examples: Vec<Examples>,
    /// Named patterns visible only inside this scenario
    pub patterns: HashMap<String, Pattern>,
    /// Documents a rejected request; any 4xx response satisfies it
    pub is_negative: bool,
    pub ignore_failure: bool,
    /// Stricter shape for the 4xx response of a negative case
    pub bad_request: Option<HttpResponsePattern>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, request: HttpRequestPattern, response: HttpResponsePattern) -> Self {
        Self {
            name: name.into(),
            request,
            response,
            expected_facts: IndexMap::new(),
            examples: Vec::new(),
            patterns: HashMap::new(),
            is_negative: false,
            ignore_failure: false,
            bad_request: None,
        }
    }

    pub fn with_fact(mut self, name: impl Into<String>, value: Value) -> Self {
        self.expected_facts.insert(name.into(), value);
        self
    }

    pub fn with_examples(mut self, examples: Examples) -> Self {
        self.examples.push(examples);
        self
    }

    pub fn with_pattern(mut self, name: impl Into<String>, pattern: Pattern) -> Self {
        self.patterns.insert(name.into(), pattern);
        self
    }

    pub fn with_bad_request(mut self, pattern: HttpResponsePattern) -> Self {
        self.bad_request = Some(pattern);
        self
    }

    /// The base resolver with this scenario's local patterns layered on top
    pub fn resolver(&self, base: &Resolver) -> Resolver {
        base.with_more_patterns(&self.patterns)
    }

    // ========================================================================
    // Matching
    // ========================================================================

    /// Check server state, then the request. A panic inside matching is
    /// reported as a failure of this scenario only.
    pub fn matches(&self, request: &HttpRequest, resolver: &Resolver) -> MatchResult {
        let resolver = self.resolver(resolver);
        self.guarded(|| {
            self.matches_facts(&resolver)
                .and_then(|| self.request.matches(request, &resolver))
        })
    }

    /// Whether an example request/response pair is a valid instance of
    /// this case. Pattern tokens are accepted in place of values.
    pub fn matches_mock(&self, request: &HttpRequest, response: &HttpResponse, resolver: &Resolver) -> MatchResult {
        let resolver = self
            .resolver(resolver)
            .with_mock_mode(true)
            .with_messages(Arc::new(ContractVsStub));
        self.guarded(|| {
            self.request
                .matches(request, &resolver)
                .and_then(|| self.response.matches(response, &resolver))
        })
    }

    /// Validate a live response. A negative case accepts any 4xx unless it
    /// carries a stricter bad-request shape.
    pub fn matches_response(&self, response: &HttpResponse, resolver: &Resolver) -> MatchResult {
        let resolver = self
            .resolver(resolver)
            .with_messages(Arc::new(ContractVsResponse));
        self.guarded(|| {
            if !self.is_negative {
                return self.response.matches(response, &resolver);
            }
            match &self.bad_request {
                Some(pattern) => pattern.matches(response, &resolver),
                None if (400..500).contains(&response.status) => MatchResult::Success,
                None => MatchResult::failure_with_reason(
                    format!("Expected 4xx status, but received {}", response.status),
                    FailureReason::StatusMismatch,
                )
                .breadcrumb("STATUS")
                .breadcrumb("RESPONSE"),
            }
        })
    }

    fn matches_facts(&self, resolver: &Resolver) -> MatchResult {
        MatchResult::all(self.expected_facts.iter().map(|(name, expected)| {
            let result = match resolver.facts().get(name) {
                None => MatchResult::failure(format!(
                    "Expected fact \"{name}\" was not set in the server state"
                )),
                Some(actual) => match expected.as_str().and_then(token_pattern) {
                    Some(pattern) => pattern.matches(&actual, resolver),
                    None if values_equal(expected, &actual) => MatchResult::Success,
                    None => resolver.mismatch(&expected.display_with_type(), &actual),
                },
            };
            result
                .breadcrumb(name.as_str())
                .breadcrumb("FACTS")
                .with_reason(FailureReason::FactMismatch)
        }))
    }

    fn guarded(&self, check: impl FnOnce() -> MatchResult) -> MatchResult {
        let result = catch_unwind(AssertUnwindSafe(check)).unwrap_or_else(|panic| {
            let message = panic
                .downcast_ref::<String>()
                .cloned()
                .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
                .unwrap_or_else(|| "unknown error".to_string());
            warn!(scenario = %self.name, "matching panicked: {}", message);
            MatchResult::failure(format!("Error while matching scenario: {message}"))
        });
        result.with_scenario(&self.name)
    }

    // ========================================================================
    // Generation
    // ========================================================================

    /// Best-effort response: the first example-narrowed variant, generated
    pub fn generate_response(&self, resolver: &Resolver) -> HttpResponse {
        let resolver = self.resolver(resolver);
        let row = self.rows().into_iter().next().unwrap_or_default();
        match self.response.new_based_on(&row, &resolver) {
            Ok(variants) if !variants.is_empty() => variants[0].generate(&resolver),
            _ => self.response.generate(&resolver),
        }
    }

    /// Concrete variants of this case, one set per example row
    pub fn new_based_on(&self, resolver: &Resolver) -> Result<Vec<Scenario>, ContractError> {
        let resolver = self.resolver(resolver);
        let mut variants = Vec::new();
        for row in self.rows() {
            let responses = self.response.new_based_on(&row, &resolver)?;
            let response = responses.into_iter().next().unwrap_or_else(|| self.response.clone());
            for request in self.request.new_based_on(&row, &resolver)? {
                variants.push(Scenario {
                    name: variant_name(&self.name, &row),
                    request,
                    response: response.clone(),
                    examples: Vec::new(),
                    ..self.clone()
                });
            }
        }
        Ok(variants)
    }

    /// Cases whose request the implementation must reject with a 4xx
    pub fn negative_based_on(&self, resolver: &Resolver) -> Result<Vec<Scenario>, ContractError> {
        if self.is_negative {
            return Ok(Vec::new());
        }
        let resolver = self.resolver(resolver);
        let mut negatives = Vec::new();
        for row in self.rows() {
            for request in self.request.negative_based_on(&row, &resolver)? {
                negatives.push(Scenario {
                    name: format!("{} [negative]", variant_name(&self.name, &row)),
                    request,
                    examples: Vec::new(),
                    is_negative: true,
                    ..self.clone()
                });
            }
        }
        Ok(negatives)
    }

    fn rows(&self) -> Vec<Row> {
        let rows: Vec<Row> = self.examples.iter().flat_map(|e| e.rows.clone()).collect();
        if rows.is_empty() {
            vec![Row::default()]
        } else {
            rows
        }
    }
}

fn variant_name(name: &str, row: &Row) -> String {
    match &row.name {
        Some(example) => format!("{name} | {example}"),
        None => name.to_string(),
    }
}
