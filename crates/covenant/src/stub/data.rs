//! A registered expectation.

use crate::http::{HttpRequest, HttpRequestPattern, HttpResponse};
use crate::resolver::Resolver;
use crate::result::MatchResult;
use std::time::Duration;

/// A generalized request pattern and the response to serve for it
#[derive(Debug, Clone)]
pub struct HttpStubData {
    pub request: HttpRequestPattern,
    pub response: HttpResponse,
    pub resolver: Resolver,
    pub delay: Option<Duration>,
    /// Set for transient expectations, which can be removed by id
    pub stub_id: Option<String>,
    pub scenario: Option<String>,
}

impl HttpStubData {
    pub fn new(request: HttpRequestPattern, response: HttpResponse, resolver: Resolver) -> Self {
        Self {
            request,
            response,
            resolver,
            delay: None,
            stub_id: None,
            scenario: None,
        }
    }

    pub fn with_delay(mut self, delay: Option<Duration>) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_stub_id(mut self, stub_id: impl Into<String>) -> Self {
        self.stub_id = Some(stub_id.into());
        self
    }

    pub fn with_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenario = Some(scenario.into());
        self
    }

    pub fn matches(&self, request: &HttpRequest) -> MatchResult {
        self.request.matches(request, &self.resolver)
    }

    /// Whether two expectations cover the same class of requests
    pub fn same_shape(&self, other: &HttpStubData) -> bool {
        self.request == other.request
    }
}
