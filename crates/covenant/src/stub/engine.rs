//! Request answering and expectation registration.
//!
//! For every request the stub tries, in order: transient expectations,
//! persistent expectations, then a response generated from the contracts.
//! In strict mode the last step is replaced by a 400 explaining why no
//! expectation matched.

use super::{ExpectationStore, HttpStubData, EMPTY_HEADER, RESULT_HEADER, TYPE_HEADER};
use crate::error::ContractError;
use crate::feature::{Feature, StubResponse};
use crate::http::{HttpRequest, HttpResponse};
use crate::result::{Failure, Failures};
use std::time::Duration;
use tracing::{debug, info};

/// An example request/response pair to register
#[derive(Debug, Clone, PartialEq)]
pub struct Expectation {
    pub request: HttpRequest,
    pub response: HttpResponse,
    pub delay: Option<Duration>,
    pub stub_id: Option<String>,
    /// One-shot: consumed by the first request it answers
    pub transient: bool,
}

impl Expectation {
    pub fn new(request: HttpRequest, response: HttpResponse) -> Self {
        Self {
            request,
            response,
            delay: None,
            stub_id: None,
            transient: false,
        }
    }

    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    pub fn with_stub_id(mut self, stub_id: impl Into<String>) -> Self {
        self.stub_id = Some(stub_id.into());
        self.transient = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StubSettings {
    /// Answer unmatched requests with a 400 instead of a generated response
    pub strict: bool,
    pub default_delay: Option<Duration>,
}

/// What to send back, and how long to wait before sending it
#[derive(Debug, Clone, PartialEq)]
pub struct StubReply {
    pub response: HttpResponse,
    pub delay: Option<Duration>,
}

impl StubReply {
    fn success(response: HttpResponse, delay: Option<Duration>) -> Self {
        Self {
            response: response.with_header(RESULT_HEADER, "success"),
            delay,
        }
    }

    fn failure(report: String) -> Self {
        Self {
            response: HttpResponse::bad_request(report).with_header(RESULT_HEADER, "failure"),
            delay: None,
        }
    }
}

pub struct HttpStub {
    features: Vec<Feature>,
    store: ExpectationStore,
    settings: StubSettings,
}

impl HttpStub {
    pub fn new(features: Vec<Feature>, settings: StubSettings) -> Self {
        Self {
            features,
            store: ExpectationStore::new(),
            settings,
        }
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn store(&self) -> &ExpectationStore {
        &self.store
    }

    pub fn settings(&self) -> &StubSettings {
        &self.settings
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Validate an expectation against the contracts and store it
    pub fn register(&self, expectation: Expectation) -> Result<HttpStubData, ContractError> {
        let mut reports = Vec::new();
        for feature in &self.features {
            match feature.matching_stub(&expectation.request, &expectation.response) {
                Ok(stub) => return Ok(self.store_expectation(stub, &expectation)),
                Err(ContractError::NoMatchingScenario { report }) => reports.push(report),
                Err(other) => return Err(other),
            }
        }
        Err(ContractError::NoMatchingScenario {
            report: closest(reports)
                .unwrap_or_else(|| Failures::single(Failure::new("The contract is empty"))),
        })
    }

    fn store_expectation(&self, stub: HttpStubData, expectation: &Expectation) -> HttpStubData {
        let stub = stub.with_delay(expectation.delay.or(self.settings.default_delay));
        if !expectation.transient {
            info!(scenario = ?stub.scenario, "registered expectation");
            self.store.add_persistent(stub.clone());
            return stub;
        }
        let stub_id = expectation
            .stub_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let stub = stub.with_stub_id(stub_id.clone());
        info!(stub_id = %stub_id, scenario = ?stub.scenario, "registered transient expectation");
        self.store.add_transient(stub.clone());
        stub
    }

    /// Remove a transient expectation. Returns whether it existed.
    pub fn remove(&self, stub_id: &str) -> bool {
        let removed = self.store.remove_transient(stub_id);
        debug!(stub_id = %stub_id, removed, "remove transient expectation");
        removed
    }

    // ========================================================================
    // Answering
    // ========================================================================

    pub fn respond(&self, request: &HttpRequest) -> StubReply {
        let transient_misses = match self.store.take_transient(request) {
            Ok(stub) => {
                debug!(stub_id = ?stub.stub_id, "served transient expectation");
                return StubReply::success(stub.response, stub.delay);
            }
            Err(misses) => misses,
        };
        let persistent_misses = match self.store.find_persistent(request) {
            Ok(stub) => {
                debug!(scenario = ?stub.scenario, "served persistent expectation");
                return StubReply::success(stub.response, stub.delay);
            }
            Err(misses) => misses,
        };

        if self.settings.strict {
            let aggregated = transient_misses
                .into_iter()
                .chain(persistent_misses)
                .reduce(Failures::merge);
            let detail = match aggregated {
                Some(report) => report.to_report(),
                None => format!(
                    "No expectation was registered for {} {}",
                    request.method, request.path
                ),
            };
            return StubReply::failure(format!("STRICT MODE ON\n\n{detail}"));
        }

        self.respond_from_contracts(request)
    }

    fn respond_from_contracts(&self, request: &HttpRequest) -> StubReply {
        let mut reports = Vec::new();
        for feature in &self.features {
            match feature.stub_response(request) {
                StubResponse::Generated { scenario, response } => {
                    debug!(scenario = %scenario, "generated response from contract");
                    let response = response.with_header(TYPE_HEADER, "random");
                    return StubReply::success(response, self.settings.default_delay);
                }
                StubResponse::NoMatch(report) => reports.push(report),
                StubResponse::EmptyContract => {}
            }
        }

        match closest(reports) {
            Some(report) => StubReply::failure(report.to_report()),
            None => {
                let mut reply = StubReply::failure("The contract is empty".to_string());
                reply.response = reply.response.with_header(EMPTY_HEADER, "true");
                reply
            }
        }
    }
}

/// The report least likely to be shape noise
fn closest(reports: Vec<Failures>) -> Option<Failures> {
    reports.into_iter().min_by_key(Failures::fluff_level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpRequestPattern, HttpResponsePattern, HttpUrlPattern};
    use crate::pattern::parse_pattern;
    use crate::scenario::Scenario;
    use crate::value::Value;
    use serde_json::json;
    use tracing_test::traced_test;

    fn number_stub(strict: bool) -> HttpStub {
        let scenario = Scenario::new(
            "get number",
            HttpRequestPattern::new("GET", HttpUrlPattern::parse("/number/(id:number)").unwrap()),
            HttpResponsePattern::new(200).with_body(parse_pattern(&json!({"number": "(number)"})).unwrap()),
        );
        HttpStub::new(
            vec![Feature::new("numbers", vec![scenario])],
            StubSettings {
                strict,
                default_delay: None,
            },
        )
    }

    fn reply_with(n: i64) -> HttpResponse {
        HttpResponse::ok(Value::from_json(json!({"number": n})))
    }

    fn served(stub: &HttpStub, path: &str) -> HttpResponse {
        stub.respond(&HttpRequest::new("GET", path)).response
    }

    #[test]
    fn test_transient_then_fallback() {
        let stub = number_stub(false);
        let request = HttpRequest::new("GET", "/number/1");
        stub.register(Expectation::new(request.clone(), reply_with(1)).transient())
            .unwrap();
        stub.register(Expectation::new(request.clone(), reply_with(2)).transient())
            .unwrap();

        assert_eq!(served(&stub, "/number/1").body, reply_with(1).body);
        assert_eq!(served(&stub, "/number/1").body, reply_with(2).body);

        let fallback = served(&stub, "/number/1");
        assert_eq!(fallback.header(TYPE_HEADER), Some("random"));
        assert_eq!(fallback.header(RESULT_HEADER), Some("success"));
    }

    #[test]
    #[traced_test]
    fn test_registration_is_logged() {
        let stub = number_stub(false);
        let registered = stub
            .register(Expectation::new(HttpRequest::new("GET", "/number/1"), reply_with(1)).transient())
            .unwrap();
        assert!(registered.stub_id.is_some());
        assert!(logs_contain("registered transient expectation"));
    }

    #[test]
    fn test_persistent_after_transient() {
        let stub = number_stub(false);
        let request = HttpRequest::new("GET", "/number/5");
        stub.register(Expectation::new(request.clone(), reply_with(50))).unwrap();
        stub.register(Expectation::new(request.clone(), reply_with(10)).transient())
            .unwrap();

        assert_eq!(served(&stub, "/number/5").body, reply_with(10).body);
        for _ in 0..3 {
            assert_eq!(served(&stub, "/number/5").body, reply_with(50).body);
        }
    }

    #[test]
    fn test_registered_request_covers_its_shape() {
        let stub = number_stub(false);
        stub.register(Expectation::new(HttpRequest::new("GET", "/number/1"), reply_with(7)))
            .unwrap();
        assert_eq!(served(&stub, "/number/99").body, reply_with(7).body);
    }

    #[test]
    fn test_invalid_expectation_rejected() {
        let stub = number_stub(false);
        let bad = HttpResponse::ok(Value::from_json(json!({"number": "seven"})));
        let err = stub
            .register(Expectation::new(HttpRequest::new("GET", "/number/1"), bad))
            .unwrap_err();
        assert!(err.to_string().contains("RESPONSE.BODY.number"));
        assert_eq!(stub.store().persistent_count(), 0);
    }

    #[test]
    fn test_unmatched_request_gets_report() {
        let stub = number_stub(false);
        let response = served(&stub, "/number/abc");
        assert_eq!(response.status, 400);
        assert_eq!(response.header(RESULT_HEADER), Some("failure"));
        assert!(response.body_text().contains(">> REQUEST.PATH.id"));
    }

    #[test]
    fn test_strict_mode_rejects_unregistered_requests() {
        let stub = number_stub(true);
        let response = served(&stub, "/number/1");
        assert_eq!(response.status, 400);
        assert!(response.body_text().starts_with("STRICT MODE ON"));

        stub.register(Expectation::new(HttpRequest::new("GET", "/number/1"), reply_with(1)))
            .unwrap();
        assert_eq!(served(&stub, "/number/1").status, 200);
    }

    #[test]
    fn test_strict_mode_reports_every_miss() {
        let stub = number_stub(true);
        stub.register(Expectation::new(HttpRequest::new("GET", "/number/1"), reply_with(1)))
            .unwrap();
        stub.register(Expectation::new(HttpRequest::new("GET", "/number/2"), reply_with(2)).transient())
            .unwrap();

        let response = served(&stub, "/number/5");
        assert_eq!(response.status, 400);
        let body = response.body_text();
        assert!(body.starts_with("STRICT MODE ON\n\n"), "{body}");
        assert_eq!(body.matches(">> REQUEST.PATH.id").count(), 2, "{body}");
    }

    #[test]
    fn test_remove_transient_and_delay() {
        let stub = number_stub(false);
        let request = HttpRequest::new("GET", "/number/3");
        let registered = stub
            .register(
                Expectation::new(request.clone(), reply_with(3))
                    .with_stub_id("three")
                    .with_delay(Duration::from_millis(20)),
            )
            .unwrap();
        assert_eq!(registered.stub_id.as_deref(), Some("three"));
        assert!(stub.remove("three"));
        assert!(!stub.remove("three"));

        stub.register(Expectation::new(request.clone(), reply_with(4)).with_delay(Duration::from_millis(20)))
            .unwrap();
        assert_eq!(stub.respond(&request).delay, Some(Duration::from_millis(20)));
    }

    #[test]
    fn test_empty_stub() {
        let stub = HttpStub::new(Vec::new(), StubSettings::default());
        let response = served(&stub, "/anything");
        assert_eq!(response.status, 400);
        assert_eq!(response.header(EMPTY_HEADER), Some("true"));
    }
}
