//! A contract: the ordered scenarios parsed from one specification.
//!
//! [`Feature`] resolves an incoming request to the scenario that documents
//! it. Scenarios are evaluated lazily in order and the first success wins.
//! When nothing matches, the most informative failure is reported: a
//! request that reached the right operation with a bad body says more than
//! one that simply used another path.
//!
//! Server state facts set through [`Feature::set_server_state`] are visible
//! to the next lookup only; every lookup clears them on the way out.

use crate::contract_test::ContractTest;
use crate::error::ContractError;
use crate::http::{HttpRequest, HttpResponse};
use crate::resolver::{FactStore, Resolver};
use crate::result::{Failure, Failures, MatchResult};
use crate::scenario::Scenario;
use crate::stub::HttpStubData;
use crate::value::Value;
use tracing::debug;

/// Failures at or below this level describe a request aimed at a real
/// operation of the contract
const INFORMATIVE_FLUFF: u8 = 1;

/// Outcome of resolving a request against the contract
#[derive(Debug, Clone, PartialEq)]
pub enum StubResponse {
    /// A scenario matched; the response was generated from it
    Generated { scenario: String, response: HttpResponse },
    /// No scenario matched; the report explains the closest miss
    NoMatch(Failures),
    /// The contract has no scenarios at all
    EmptyContract,
}

#[derive(Debug)]
pub struct Feature {
    pub name: String,
    pub scenarios: Vec<Scenario>,
    resolver: Resolver,
    server_state: FactStore,
}

/// Clears the server state when a lookup finishes, however it finishes
struct ServerStateReset<'a>(&'a FactStore);

impl Drop for ServerStateReset<'_> {
    fn drop(&mut self) {
        self.0.clear();
    }
}

impl Feature {
    pub fn new(name: impl Into<String>, scenarios: Vec<Scenario>) -> Self {
        let server_state = FactStore::new();
        Self {
            name: name.into(),
            scenarios,
            resolver: Resolver::new().with_facts(server_state.clone()),
            server_state,
        }
    }

    /// Replace the base resolver (shared patterns, combination cap). The
    /// feature's server state stays attached.
    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver.with_facts(self.server_state.clone());
        self
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// Facts visible to the next lookup
    pub fn set_server_state(&self, facts: impl IntoIterator<Item = (String, Value)>) {
        self.server_state.extend(facts);
    }

    pub fn server_state(&self) -> &FactStore {
        &self.server_state
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Every scenario paired with its match result, evaluated on demand
    pub fn lookup_results<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> impl Iterator<Item = (&'a Scenario, MatchResult)> + 'a {
        self.scenarios
            .iter()
            .map(move |scenario| (scenario, scenario.matches(request, &self.resolver)))
    }

    /// The scenario documenting `request`, or the report of the closest miss
    pub fn lookup_scenario<'a>(&'a self, request: &'a HttpRequest) -> Result<&'a Scenario, Failures> {
        let _reset = ServerStateReset(&self.server_state);
        if self.scenarios.is_empty() {
            return Err(empty_contract());
        }
        select(self.lookup_results(request), || {
            not_recognized(&request.method, &request.path)
        })
    }

    /// Contract-generated response for `request`
    pub fn stub_response(&self, request: &HttpRequest) -> StubResponse {
        if self.scenarios.is_empty() {
            self.server_state.clear();
            return StubResponse::EmptyContract;
        }
        match self.lookup_scenario(request) {
            Ok(scenario) => {
                debug!(feature = %self.name, scenario = %scenario.name, "request matched contract");
                StubResponse::Generated {
                    scenario: scenario.name.clone(),
                    response: scenario.generate_response(&self.resolver),
                }
            }
            Err(report) => StubResponse::NoMatch(report),
        }
    }

    /// Turn an example request/response pair into a stub. The literal
    /// request is widened to the contract type at each position, so later
    /// requests of the same shape reuse the response.
    pub fn matching_stub(
        &self,
        request: &HttpRequest,
        response: &HttpResponse,
    ) -> Result<HttpStubData, ContractError> {
        let _reset = ServerStateReset(&self.server_state);
        if self.scenarios.is_empty() {
            return Err(ContractError::NoMatchingScenario {
                report: empty_contract(),
            });
        }
        let results = self.scenarios.iter().map(|scenario| {
            (scenario, scenario.matches_mock(request, response, &self.resolver))
        });
        let scenario = select(results, || not_recognized(&request.method, &request.path))
            .map_err(|report| ContractError::NoMatchingScenario { report })?;

        let resolver = scenario.resolver(&self.resolver).with_mock_mode(true);
        Ok(HttpStubData::new(
            scenario.request.generalize(request, &resolver),
            response.clone(),
            resolver.with_mock_mode(false),
        )
        .with_scenario(scenario.name.clone()))
    }

    // ========================================================================
    // Test generation
    // ========================================================================

    /// Positive variants of every scenario, followed by negative ones
    pub fn generate_contract_tests(&self) -> Result<Vec<ContractTest>, ContractError> {
        let mut tests = Vec::new();
        for scenario in &self.scenarios {
            for variant in scenario.new_based_on(&self.resolver)? {
                tests.push(ContractTest::new(variant, self.resolver.clone()));
            }
        }
        for scenario in &self.scenarios {
            for negative in scenario.negative_based_on(&self.resolver)? {
                tests.push(ContractTest::new(negative, self.resolver.clone()));
            }
        }
        debug!(feature = %self.name, count = tests.len(), "generated contract tests");
        Ok(tests)
    }
}

/// First success; otherwise the first informative failure; otherwise the
/// fallback report
fn select<'a>(
    results: impl Iterator<Item = (&'a Scenario, MatchResult)>,
    fallback: impl FnOnce() -> Failures,
) -> Result<&'a Scenario, Failures> {
    let mut by_level: [Option<Failures>; (INFORMATIVE_FLUFF + 1) as usize] = Default::default();
    for (scenario, result) in results {
        match result {
            MatchResult::Success => return Ok(scenario),
            MatchResult::Failure(failures) => {
                let level = failures.fluff_level();
                if level <= INFORMATIVE_FLUFF {
                    by_level[level as usize].get_or_insert(failures);
                }
            }
        }
    }
    Err(by_level.into_iter().flatten().next().unwrap_or_else(fallback))
}

fn not_recognized(method: &str, path: &str) -> Failures {
    Failures::single(Failure::new(format!(
        "No contract operation matches {method} {path}: the path was not recognized"
    )))
}

fn empty_contract() -> Failures {
    Failures::single(Failure::new("The contract is empty"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpRequestPattern, HttpResponsePattern, HttpUrlPattern};
    use crate::pattern::parse_pattern;
    use crate::result::FailureReason;
    use serde_json::json;

    fn orders_feature() -> Feature {
        let get = Scenario::new(
            "get order",
            HttpRequestPattern::new("GET", HttpUrlPattern::parse("/orders/(id:number)").unwrap()),
            HttpResponsePattern::new(200).with_body(parse_pattern(&json!({"id": "(number)"})).unwrap()),
        );
        let create = Scenario::new(
            "create order",
            HttpRequestPattern::new("POST", HttpUrlPattern::parse("/orders").unwrap())
                .with_body(parse_pattern(&json!({"item": "(string)"})).unwrap()),
            HttpResponsePattern::new(201),
        );
        Feature::new("orders", vec![get, create])
    }

    #[test]
    fn test_first_success_wins() {
        let feature = orders_feature();
        let request = HttpRequest::new("GET", "/orders/10");
        assert_eq!(feature.lookup_scenario(&request).unwrap().name, "get order");

        match feature.stub_response(&request) {
            StubResponse::Generated { scenario, response } => {
                assert_eq!(scenario, "get order");
                assert_eq!(response.status, 200);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_matched_scenario_borrows_from_feature() {
        let feature = orders_feature();
        let matched = {
            let request = HttpRequest::new("POST", "/orders")
                .with_body(Value::from_json(json!({"item": "pen"})));
            feature.lookup_scenario(&request).map(|s| s.name.clone())
        };
        assert_eq!(matched.unwrap(), "create order");
        assert!(format!("{feature:?}").contains("\"orders\""));
    }

    #[test]
    fn test_informative_failure_preferred_over_fluff() {
        let feature = orders_feature();
        let request = HttpRequest::new("POST", "/orders")
            .with_body(Value::from_json(json!({"item": 5})));
        let report = feature.lookup_scenario(&request).unwrap_err();
        let failure = report.first();
        assert_eq!(failure.scenario.as_deref(), Some("create order"));
        assert_eq!(failure.path(), "REQUEST.BODY.item");
    }

    #[test]
    fn test_path_param_mismatch_ranked_next() {
        let feature = orders_feature();
        let report = feature
            .lookup_scenario(&HttpRequest::new("GET", "/orders/abc"))
            .unwrap_err();
        assert!(report.has_reason(FailureReason::UrlPathParamMismatchButSameStructure));
        assert_eq!(report.first().scenario.as_deref(), Some("get order"));
    }

    #[test]
    fn test_unrecognized_path_and_empty_contract() {
        let feature = orders_feature();
        let report = feature
            .lookup_scenario(&HttpRequest::new("GET", "/customers"))
            .unwrap_err();
        assert!(report.to_report().contains("was not recognized"));

        let empty = Feature::new("empty", Vec::new());
        assert_eq!(
            empty.stub_response(&HttpRequest::new("GET", "/")),
            StubResponse::EmptyContract
        );
        let report = empty.lookup_scenario(&HttpRequest::new("GET", "/")).unwrap_err();
        assert_eq!(report.to_report(), "   The contract is empty");
    }

    #[test]
    fn test_server_state_cleared_after_lookup() {
        let scenario = Scenario::new(
            "get existing order",
            HttpRequestPattern::new("GET", HttpUrlPattern::parse("/orders/(id:number)").unwrap()),
            HttpResponsePattern::new(200),
        )
        .with_fact("id", Value::string("(number)"));
        let feature = Feature::new("orders", vec![scenario]);
        let request = HttpRequest::new("GET", "/orders/1");

        feature.set_server_state([("id".to_string(), Value::integer(1))]);
        assert!(feature.lookup_scenario(&request).is_ok());
        assert!(feature.server_state().is_empty());
        assert!(feature.lookup_scenario(&request).is_err());
        assert!(feature.server_state().is_empty());
    }

    #[test]
    fn test_matching_stub_generalizes_request() {
        let feature = orders_feature();
        let example = HttpRequest::new("GET", "/orders/42");
        let response = HttpResponse::new(200).with_body(Value::from_json(json!({"id": 42})));
        let stub = feature.matching_stub(&example, &response).unwrap();

        assert!(stub.matches(&HttpRequest::new("GET", "/orders/7")).is_success());
        assert!(stub.matches(&HttpRequest::new("GET", "/orders/x")).is_failure());
        assert_eq!(stub.response, response);

        let bad = HttpResponse::new(200).with_body(Value::from_json(json!({"id": "x"})));
        let err = feature.matching_stub(&example, &bad).unwrap_err();
        assert!(matches!(err, ContractError::NoMatchingScenario { .. }));
    }

    #[test]
    fn test_generate_contract_tests() {
        let feature = orders_feature();
        let tests = feature.generate_contract_tests().unwrap();
        let positives = tests.iter().filter(|t| !t.scenario.is_negative).count();
        assert_eq!(positives, 2);
        assert!(tests.iter().any(|t| t.scenario.is_negative));
    }
}
