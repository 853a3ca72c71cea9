//! Route dispatch for the stub server.
//!
//! Paths under `/_covenant` manage expectations; every other request is a
//! call to the virtualized API.

use super::types::{
    collect_body, error_response, json_response, method_not_allowed, not_found, HealthResponse,
    RegisteredResponse,
};
use super::wire::{to_hyper_response, to_stub_request};
use super::CONTROL_PREFIX;
use crate::document::ExpectationDocument;
use crate::error::ContractError;
use crate::stub::HttpStub;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Parsed control endpoint
#[derive(Debug, PartialEq)]
enum ControlRoute {
    /// POST /_covenant/expectations
    Expectations,
    /// DELETE /_covenant/http-stub/:id
    StubById(String),
    /// GET /_covenant/health
    Health,
}

impl ControlRoute {
    fn parse(path: &str) -> Option<Self> {
        let rest = path.strip_prefix(CONTROL_PREFIX)?;
        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            ["expectations"] => Some(ControlRoute::Expectations),
            ["http-stub", id] => Some(ControlRoute::StubById(
                urlencoding::decode(id).map(|d| d.into_owned()).unwrap_or_else(|_| id.to_string()),
            )),
            ["health"] => Some(ControlRoute::Health),
            _ => None,
        }
    }
}

/// Main request router
pub async fn route_request(
    req: Request<Incoming>,
    stub: Arc<HttpStub>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!("Stub: {} {}", method, path);

    let response = match ControlRoute::parse(&path) {
        Some(route) => handle_control(&method, route, req, &stub).await,
        None if path.starts_with(CONTROL_PREFIX) => not_found(),
        None => handle_stub_request(req, &stub).await,
    };
    Ok(response)
}

async fn handle_control(
    method: &Method,
    route: ControlRoute,
    req: Request<Incoming>,
    stub: &HttpStub,
) -> Response<Full<Bytes>> {
    match (method, route) {
        (&Method::POST, ControlRoute::Expectations) => handle_register(req, stub).await,
        (&Method::DELETE, ControlRoute::StubById(id)) => handle_remove(&id, stub),
        (&Method::GET, ControlRoute::Health) => json_response(
            StatusCode::OK,
            &HealthResponse {
                status: "UP",
                contracts: stub.features().len(),
                transient_expectations: stub.store().transient_count(),
                persistent_expectations: stub.store().persistent_count(),
            },
        ),
        _ => method_not_allowed(),
    }
}

async fn handle_register(req: Request<Incoming>, stub: &HttpStub) -> Response<Full<Bytes>> {
    let body = match collect_body(req).await {
        Ok(body) => body,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };
    let document: ExpectationDocument = match serde_json::from_slice(&body) {
        Ok(document) => document,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid expectation document: {e}"),
            )
        }
    };
    let registered = document
        .into_expectation()
        .and_then(|expectation| stub.register(expectation));

    match registered {
        Ok(data) => json_response(
            StatusCode::OK,
            &RegisteredResponse {
                transient: data.stub_id.is_some(),
                stub_id: data.stub_id,
                scenario: data.scenario,
            },
        ),
        Err(e @ ContractError::NoMatchingScenario { .. }) => {
            warn!("Rejected expectation: {}", e);
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

fn handle_remove(stub_id: &str, stub: &HttpStub) -> Response<Full<Bytes>> {
    if stub.remove(stub_id) {
        info!(stub_id = %stub_id, "removed transient expectation");
        json_response(StatusCode::OK, &serde_json::json!({ "http-stub-id": stub_id }))
    } else {
        error_response(
            StatusCode::NOT_FOUND,
            &format!("No transient expectation with id {stub_id}"),
        )
    }
}

async fn handle_stub_request(req: Request<Incoming>, stub: &HttpStub) -> Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Failed to read request body: {e}"),
            )
        }
    };
    let request = to_stub_request(&parts, &body);
    let reply = stub.respond(&request);
    debug!(
        status = reply.response.status,
        delay_ms = reply.delay.map(|d| d.as_millis() as u64),
        "stub reply"
    );
    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }
    to_hyper_response(&reply.response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_route_parse() {
        assert_eq!(
            ControlRoute::parse("/_covenant/expectations"),
            Some(ControlRoute::Expectations)
        );
        assert_eq!(
            ControlRoute::parse("/_covenant/http-stub/abc%20d"),
            Some(ControlRoute::StubById("abc d".to_string()))
        );
        assert_eq!(ControlRoute::parse("/_covenant/health/"), Some(ControlRoute::Health));
        assert_eq!(ControlRoute::parse("/_covenant/unknown"), None);
        assert_eq!(ControlRoute::parse("/orders"), None);
    }
}
