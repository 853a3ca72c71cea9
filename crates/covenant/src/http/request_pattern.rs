//! The composite request shape.
//!
//! Matching runs URL, then method, then the message contents. The URL and
//! method checks short-circuit: a request aimed at another operation gets a
//! single fluffy failure instead of a pile of body mismatches. Headers, body,
//! form fields and multipart parts are all checked and reported together.

use super::multipart::{generate_parts, match_parts, parts_new_based_on};
use super::{
    generate_string_map, match_body, match_string_map, string_map_negative_based_on,
    string_map_new_based_on, typed_body, wire_value, HttpHeadersPattern, HttpRequest, HttpUrlPattern,
    MultipartPattern,
};
use crate::error::ContractError;
use crate::examples::Row;
use crate::pattern::{capped_product, example_pattern, ObjectField, Pattern};
use crate::resolver::Resolver;
use crate::result::{FailureReason, MatchResult};
use indexmap::IndexMap;

/// Example-row column holding a complete request body
pub const REQUEST_BODY_COLUMN: &str = "(REQUEST-BODY)";

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequestPattern {
    pub method: String,
    pub url: HttpUrlPattern,
    pub headers: HttpHeadersPattern,
    pub body: Pattern,
    pub form_fields: IndexMap<String, ObjectField>,
    pub multipart: Vec<MultipartPattern>,
}

impl HttpRequestPattern {
    pub fn new(method: impl Into<String>, url: HttpUrlPattern) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url,
            headers: HttpHeadersPattern::new(),
            body: Pattern::NoBody,
            form_fields: IndexMap::new(),
            multipart: Vec::new(),
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

    pub fn with_form_field(mut self, name: impl Into<String>, field: ObjectField) -> Self {
        self.form_fields.insert(name.into(), field);
        self
    }

    pub fn with_part(mut self, part: MultipartPattern) -> Self {
        self.multipart.push(part);
        self
    }

    /// `GET /orders/(id:number)`
    pub fn describe(&self) -> String {
        format!("{} {}", self.method, self.url.path.describe())
    }

    pub fn matches(&self, request: &HttpRequest, resolver: &Resolver) -> MatchResult {
        self.url
            .matches(request, resolver)
            .and_then(|| self.match_method(request, resolver))
            .and_then(|| {
                MatchResult::all([
                    self.headers.matches(&request.headers, resolver),
                    match_body(&self.body, &request.body, resolver).breadcrumb("BODY"),
                    self.match_form_fields(request, resolver),
                    self.match_multipart(request, resolver),
                ])
            })
            .breadcrumb("REQUEST")
    }

    fn match_method(&self, request: &HttpRequest, resolver: &Resolver) -> MatchResult {
        if self.method.eq_ignore_ascii_case(&request.method) {
            return MatchResult::Success;
        }
        resolver
            .mismatch_text(&format!("method {}", self.method), &format!("method {}", request.method))
            .breadcrumb("METHOD")
            .with_reason(FailureReason::MethodMismatch)
    }

    fn match_form_fields(&self, request: &HttpRequest, resolver: &Resolver) -> MatchResult {
        if self.form_fields.is_empty() && request.form_fields.is_empty() {
            return MatchResult::Success;
        }
        match_string_map(
            &self.form_fields,
            &request.form_fields,
            false,
            "form field",
            false,
            resolver,
        )
        .breadcrumb("FORM-FIELDS")
    }

    fn match_multipart(&self, request: &HttpRequest, resolver: &Resolver) -> MatchResult {
        if self.multipart.is_empty() && request.multipart.is_empty() {
            return MatchResult::Success;
        }
        match_parts(&self.multipart, &request.multipart, resolver)
    }

    pub fn generate(&self, resolver: &Resolver) -> HttpRequest {
        let (path, query) = self.url.generate(resolver);
        let mut request = HttpRequest::new(self.method.clone(), path);
        request.query = query;
        request.headers = self.headers.generate(resolver);
        request.body = self.body.generate(resolver);
        request.form_fields = generate_string_map(&self.form_fields, resolver);
        request.multipart = generate_parts(&self.multipart, resolver);

        if request.header("Content-Type").is_none() {
            let implied = if !request.multipart.is_empty() {
                Some("multipart/form-data")
            } else if !request.form_fields.is_empty() {
                Some("application/x-www-form-urlencoded")
            } else {
                request.body.content_type()
            };
            if let Some(content_type) = implied {
                request.headers.insert("Content-Type".to_string(), content_type.to_string());
            }
        }
        request
    }

    /// Narrowed request shapes for one example row
    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Self>, ContractError> {
        let urls = self.url.new_based_on(row, resolver)?;
        let headers = self.headers.new_based_on(row, resolver)?;
        let bodies = match row.field(REQUEST_BODY_COLUMN) {
            Some(cell) => vec![example_pattern(
                &self.body,
                REQUEST_BODY_COLUMN,
                &cell,
                resolver,
            )?],
            None => self.body.new_based_on(row, resolver)?,
        };
        let forms = string_map_new_based_on(&self.form_fields, row, resolver)?;
        let parts = parts_new_based_on(&self.multipart, row, resolver)?;

        let slots: Vec<Vec<usize>> = [urls.len(), headers.len(), bodies.len(), forms.len(), parts.len()]
            .iter()
            .map(|n| (0..*n).collect())
            .collect();
        Ok(capped_product(&slots, resolver.max_combinations())
            .into_iter()
            .map(|index| Self {
                method: self.method.clone(),
                url: urls[index[0]].clone(),
                headers: headers[index[1]].clone(),
                body: bodies[index[2]].clone(),
                form_fields: forms[index[3]].clone(),
                multipart: parts[index[4]].clone(),
            })
            .collect())
    }

    /// Request shapes a conforming implementation must reject. Each variant
    /// breaks exactly one part of the first positive variant.
    pub fn negative_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Self>, ContractError> {
        let Some(base) = self.new_based_on(row, resolver)?.into_iter().next() else {
            return Ok(Vec::new());
        };
        let mut negatives = Vec::new();

        for url in self.url.negative_based_on(row, resolver)? {
            negatives.push(Self { url, ..base.clone() });
        }
        for headers in self.headers.negative_based_on(row, resolver)? {
            negatives.push(Self {
                headers,
                ..base.clone()
            });
        }
        if !row.contains_field(REQUEST_BODY_COLUMN) {
            for body in self.body.negative_based_on(row, resolver)? {
                negatives.push(Self { body, ..base.clone() });
            }
        }
        for form_fields in string_map_negative_based_on(&self.form_fields, row, resolver)? {
            negatives.push(Self {
                form_fields,
                ..base.clone()
            });
        }
        Ok(negatives)
    }

    /// Pattern for the class of requests shaped like `request`: literal
    /// values widen to the contract type at their position.
    pub fn generalize(&self, request: &HttpRequest, resolver: &Resolver) -> Self {
        let form_fields = self
            .form_fields
            .iter()
            .filter_map(|(key, field)| {
                let text = request.form_fields.get(key)?;
                let value = wire_value(&field.pattern, text, resolver);
                Some((
                    key.clone(),
                    ObjectField::mandatory(field.pattern.generalize(&value, resolver)),
                ))
            })
            .collect();
        let body = typed_body(&self.body, &request.body, resolver);

        Self {
            method: self.method.clone(),
            url: self.url.generalize(request, resolver),
            headers: self.headers.generalize(&request.headers, resolver),
            body: self.body.generalize(&body, resolver),
            form_fields,
            multipart: self.multipart.clone(),
        }
    }
}
