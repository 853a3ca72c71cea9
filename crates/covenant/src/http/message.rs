//! Concrete HTTP requests and responses as seen by the matching engine.

use crate::value::Value;
use indexmap::IndexMap;

/// One part of a `multipart/form-data` body
#[derive(Debug, Clone, PartialEq)]
pub enum MultipartPart {
    Content {
        name: String,
        content: String,
        content_type: Option<String>,
    },
    File {
        name: String,
        filename: String,
        content_type: Option<String>,
        content: Vec<u8>,
    },
}

impl MultipartPart {
    pub fn name(&self) -> &str {
        match self {
            MultipartPart::Content { name, .. } | MultipartPart::File { name, .. } => name,
        }
    }
}

/// A request as received by the stub or produced by test generation
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub query: IndexMap<String, String>,
    pub headers: IndexMap<String, String>,
    pub body: Value,
    pub form_fields: IndexMap<String, String>,
    pub multipart: Vec<MultipartPart>,
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            path: "/".to_string(),
            query: IndexMap::new(),
            headers: IndexMap::new(),
            body: Value::Empty,
            form_fields: IndexMap::new(),
            multipart: Vec::new(),
        }
    }
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Value>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form_fields.insert(name.into(), value.into());
        self
    }

    pub fn with_part(mut self, part: MultipartPart) -> Self {
        self.multipart.push(part);
        self
    }

    /// Header value, looked up case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Path with the query string appended
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{query}", self.path)
    }

    /// Body text as sent on the wire
    pub fn body_text(&self) -> String {
        self.body.to_wire_string()
    }
}

/// A response returned by the stub or checked by a contract test
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: IndexMap<String, String>,
    pub body: Value,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self {
            status: 200,
            headers: IndexMap::new(),
            body: Value::Empty,
        }
    }
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn ok(body: impl Into<Value>) -> Self {
        Self::new(200).with_body(body)
    }

    /// 400 carrying a mismatch report as plain text
    pub fn bad_request(report: impl Into<String>) -> Self {
        Self::new(400)
            .with_header("Content-Type", "text/plain")
            .with_body(Value::String(report.into()))
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Value>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Content type to send: the explicit header, else the one implied by the body
    pub fn content_type(&self) -> Option<String> {
        self.header("Content-Type")
            .map(str::to_string)
            .or_else(|| self.body.content_type().map(str::to_string))
    }

    pub fn body_text(&self) -> String {
        self.body.to_wire_string()
    }
}

pub(crate) fn find_header<'a>(headers: &'a IndexMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
