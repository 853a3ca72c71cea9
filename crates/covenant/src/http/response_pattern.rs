//! The composite response shape.

use super::{match_body, HttpHeadersPattern, HttpResponse};
use crate::error::ContractError;
use crate::examples::Row;
use crate::pattern::{capped_product, example_pattern, Pattern};
use crate::resolver::Resolver;
use crate::result::{FailureReason, MatchResult};

/// Example-row column holding a complete response body
pub const RESPONSE_BODY_COLUMN: &str = "(RESPONSE-BODY)";

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponsePattern {
    pub status: u16,
    pub headers: HttpHeadersPattern,
    pub body: Pattern,
}

impl HttpResponsePattern {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HttpHeadersPattern::new(),
            body: Pattern::NoBody,
        }
    }

    pub fn with_headers(mut self, headers: HttpHeadersPattern) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Pattern) -> Self {
        self.body = body;
        self
    }

    /// Status first; headers and body are only compared when it matches
    pub fn matches(&self, response: &HttpResponse, resolver: &Resolver) -> MatchResult {
        self.match_status(response.status, resolver)
            .and_then(|| {
                MatchResult::all([
                    self.headers.matches(&response.headers, resolver),
                    match_body(&self.body, &response.body, resolver).breadcrumb("BODY"),
                ])
            })
            .breadcrumb("RESPONSE")
    }

    fn match_status(&self, status: u16, resolver: &Resolver) -> MatchResult {
        if self.status == status {
            return MatchResult::Success;
        }
        resolver
            .mismatch_text(&format!("status {}", self.status), &format!("status {status}"))
            .breadcrumb("STATUS")
            .with_reason(FailureReason::StatusMismatch)
    }

    pub fn generate(&self, resolver: &Resolver) -> HttpResponse {
        let mut response = HttpResponse::new(self.status);
        response.headers = self.headers.generate(resolver);
        response.body = self.body.generate(resolver);
        if response.header("Content-Type").is_none() {
            if let Some(content_type) = response.body.content_type() {
                response
                    .headers
                    .insert("Content-Type".to_string(), content_type.to_string());
            }
        }
        response
    }

    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Self>, ContractError> {
        let headers = self.headers.new_based_on(row, resolver)?;
        let bodies = match row.field(RESPONSE_BODY_COLUMN) {
            Some(cell) => vec![example_pattern(&self.body, RESPONSE_BODY_COLUMN, &cell, resolver)?],
            None => self.body.new_based_on(row, resolver)?,
        };
        let slots: Vec<Vec<usize>> = vec![(0..headers.len()).collect(), (0..bodies.len()).collect()];
        Ok(capped_product(&slots, resolver.max_combinations())
            .into_iter()
            .map(|index| Self {
                status: self.status,
                headers: headers[index[0]].clone(),
                body: bodies[index[1]].clone(),
            })
            .collect())
    }
}
