//! Serde documents for contracts and expectations.
//!
//! Contract documents describe scenarios with the pattern grammar
//! ([`parse_pattern`]); expectation documents carry a literal example
//! request and response. Both are read as YAML, which also accepts JSON.

use crate::error::ContractError;
use crate::examples::{Examples, Row};
use crate::feature::Feature;
use crate::http::{
    HttpHeadersPattern, HttpRequest, HttpRequestPattern, HttpResponse, HttpResponsePattern,
    HttpUrlPattern, MultipartPart, MultipartPattern,
};
use crate::pattern::{parse_pattern, ObjectField, Pattern};
use crate::resolver::Resolver;
use crate::scenario::Scenario;
use crate::stub::Expectation;
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Expectation documents
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectationDocument {
    #[serde(rename = "http-request")]
    pub request: RequestDocument,
    #[serde(rename = "http-response")]
    pub response: ResponseDocument,
    #[serde(rename = "delay-in-seconds", default, skip_serializing_if = "Option::is_none")]
    pub delay_in_seconds: Option<f64>,
    /// Giving an id makes the expectation transient
    #[serde(rename = "http-stub-id", default, skip_serializing_if = "Option::is_none")]
    pub stub_id: Option<String>,
    #[serde(default)]
    pub transient: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestDocument {
    #[serde(default = "default_method")]
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub query: IndexMap<String, Json>,
    #[serde(default)]
    pub headers: IndexMap<String, Json>,
    #[serde(rename = "form-fields", default)]
    pub form_fields: IndexMap<String, Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Json>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub multipart: Vec<PartDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseDocument {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default)]
    pub headers: IndexMap<String, Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Json>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_status() -> u16 {
    200
}

impl ExpectationDocument {
    pub fn into_expectation(self) -> Result<Expectation, ContractError> {
        let delay = match self.delay_in_seconds {
            None => None,
            Some(seconds) if seconds.is_finite() && seconds >= 0.0 => {
                Some(Duration::from_secs_f64(seconds))
            }
            Some(seconds) => {
                return Err(ContractError::Parse(format!(
                    "delay-in-seconds must be a non-negative number, got {seconds}"
                )))
            }
        };
        Ok(Expectation {
            request: self.request.to_request(),
            response: self.response.to_response(),
            delay,
            transient: self.transient || self.stub_id.is_some(),
            stub_id: self.stub_id,
        })
    }
}

impl RequestDocument {
    pub fn to_request(&self) -> HttpRequest {
        let (path, query_string) = match self.path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (self.path.as_str(), None),
        };
        let mut request = HttpRequest::new(self.method.clone(), path);
        if let Some(query) = query_string {
            request.query.extend(parse_query_string(query));
        }
        request.query.extend(text_map(&self.query));
        request.headers = text_map(&self.headers);
        request.form_fields = text_map(&self.form_fields);
        request.body = body_value(self.body.as_ref());
        request.multipart = self
            .multipart
            .iter()
            .map(|part| match &part.filename {
                Some(filename) => MultipartPart::File {
                    name: part.name.clone(),
                    filename: filename.clone(),
                    content_type: part.content_type.clone(),
                    content: part.content.as_ref().map(wire_text).unwrap_or_default().into_bytes(),
                },
                None => MultipartPart::Content {
                    name: part.name.clone(),
                    content: part.content.as_ref().map(wire_text).unwrap_or_default(),
                    content_type: part.content_type.clone(),
                },
            })
            .collect();
        request
    }
}

impl ResponseDocument {
    pub fn to_response(&self) -> HttpResponse {
        let mut response = HttpResponse::new(self.status);
        response.headers = text_map(&self.headers);
        response.body = body_value(self.body.as_ref());
        response
    }
}

/// Decode `a=1&b=2`
pub fn parse_query_string(query: &str) -> IndexMap<String, String> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let decode = |s: &str| {
                urlencoding::decode(&s.replace('+', " "))
                    .map(|d| d.into_owned())
                    .unwrap_or_else(|_| s.to_string())
            };
            (decode(key), decode(value))
        })
        .collect()
}

fn wire_text(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn text_map(map: &IndexMap<String, Json>) -> IndexMap<String, String> {
    map.iter().map(|(k, v)| (k.clone(), wire_text(v))).collect()
}

fn body_value(body: Option<&Json>) -> Value {
    match body {
        None | Some(Json::Null) => Value::Empty,
        Some(Json::String(text)) => Value::parse_payload(text),
        Some(other) => Value::from_json(other.clone()),
    }
}

// ============================================================================
// Contract documents
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractDocument {
    pub name: String,
    /// Named patterns shared by every scenario
    #[serde(default)]
    pub patterns: IndexMap<String, Json>,
    pub scenarios: Vec<ScenarioDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioDocument {
    pub name: String,
    pub request: RequestPatternDocument,
    pub response: ResponsePatternDocument,
    #[serde(default)]
    pub examples: Vec<ExampleDocument>,
    #[serde(default)]
    pub patterns: IndexMap<String, Json>,
    #[serde(default)]
    pub facts: IndexMap<String, Json>,
    #[serde(default)]
    pub negative: bool,
    #[serde(default)]
    pub ignore_failure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bad_request: Option<ResponsePatternDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPatternDocument {
    #[serde(default = "default_method")]
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub query: IndexMap<String, Json>,
    #[serde(default)]
    pub headers: IndexMap<String, Json>,
    #[serde(default)]
    pub form_fields: IndexMap<String, Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Json>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub multipart: Vec<PartPatternDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartPatternDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Json>,
    /// Present for file parts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsePatternDocument {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default)]
    pub headers: IndexMap<String, Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Json>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub values: IndexMap<String, Json>,
}

impl ContractDocument {
    pub fn into_feature(self) -> Result<Feature, ContractError> {
        let patterns = named_patterns(&self.patterns)?;
        let scenarios = self
            .scenarios
            .iter()
            .map(ScenarioDocument::to_scenario)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Feature::new(self.name, scenarios).with_resolver(Resolver::with_patterns(patterns)))
    }
}

impl ScenarioDocument {
    pub fn to_scenario(&self) -> Result<Scenario, ContractError> {
        let scenario_name = format!("scenario \"{}\"", self.name);
        let context = |e| in_context(&scenario_name, e);
        let mut scenario = Scenario::new(
            self.name.clone(),
            self.request.to_pattern().map_err(context)?,
            self.response.to_pattern().map_err(context)?,
        );
        scenario.patterns = named_patterns(&self.patterns).map_err(context)?;
        scenario.expected_facts = self
            .facts
            .iter()
            .map(|(k, v)| (k.clone(), Value::from_json(v.clone())))
            .collect();
        if !self.examples.is_empty() {
            let rows = self
                .examples
                .iter()
                .map(|example| {
                    let row = Row::from_pairs(example.values.iter().map(|(k, v)| (k.clone(), wire_text(v))));
                    match &example.name {
                        Some(name) => row.named(name.clone()),
                        None => row,
                    }
                })
                .collect();
            scenario.examples.push(Examples::new(rows));
        }
        scenario.is_negative = self.negative;
        scenario.ignore_failure = self.ignore_failure;
        scenario.bad_request = self
            .bad_request
            .as_ref()
            .map(ResponsePatternDocument::to_pattern)
            .transpose()
            .map_err(context)?;
        Ok(scenario)
    }
}

impl RequestPatternDocument {
    pub fn to_pattern(&self) -> Result<HttpRequestPattern, ContractError> {
        let mut url = HttpUrlPattern::parse(&self.path)?;
        url.query = fields(&self.query)?;

        let mut pattern = HttpRequestPattern::new(self.method.clone(), url)
            .with_headers(HttpHeadersPattern {
                headers: fields(&self.headers)?,
            })
            .with_body(body_pattern(self.body.as_ref())?);
        pattern.form_fields = fields(&self.form_fields)?;
        pattern.multipart = self
            .multipart
            .iter()
            .map(PartPatternDocument::to_pattern)
            .collect::<Result<_, _>>()?;
        Ok(pattern)
    }
}

impl PartPatternDocument {
    fn to_pattern(&self) -> Result<MultipartPattern, ContractError> {
        let part = match &self.filename {
            Some(filename) => MultipartPattern::File {
                name: self.name.clone(),
                filename: parse_pattern(filename)?,
                content_type: self.content_type.clone(),
                optional: false,
            },
            None => MultipartPattern::Content {
                name: self.name.clone(),
                content: match &self.content {
                    Some(content) => parse_pattern(content)?,
                    None => Pattern::string(),
                },
                content_type: self.content_type.clone(),
                optional: false,
            },
        };
        Ok(if self.optional { part.optional() } else { part })
    }
}

impl ResponsePatternDocument {
    pub fn to_pattern(&self) -> Result<HttpResponsePattern, ContractError> {
        Ok(HttpResponsePattern::new(self.status)
            .with_headers(HttpHeadersPattern {
                headers: fields(&self.headers)?,
            })
            .with_body(body_pattern(self.body.as_ref())?))
    }
}

/// `name?` keys are optional
fn fields(map: &IndexMap<String, Json>) -> Result<IndexMap<String, ObjectField>, ContractError> {
    map.iter()
        .map(|(key, doc)| {
            let pattern = parse_pattern(doc)?;
            Ok(match key.strip_suffix('?') {
                Some(name) => (name.to_string(), ObjectField::optional(pattern)),
                None => (key.clone(), ObjectField::mandatory(pattern)),
            })
        })
        .collect()
}

fn in_context(context: &str, error: ContractError) -> ContractError {
    match error {
        ContractError::MalformedSpecification(message) => {
            ContractError::malformed(format!("{context}: {message}"))
        }
        other => ContractError::malformed(format!("{context}: {other}")),
    }
}

fn body_pattern(body: Option<&Json>) -> Result<Pattern, ContractError> {
    match body {
        None | Some(Json::Null) => Ok(Pattern::NoBody),
        Some(doc) => parse_pattern(doc),
    }
}

fn named_patterns(map: &IndexMap<String, Json>) -> Result<HashMap<String, Pattern>, ContractError> {
    map.iter()
        .map(|(name, doc)| {
            let bare = name.trim_start_matches('(').trim_end_matches(')');
            Ok((bare.to_string(), parse_pattern(doc)?))
        })
        .collect()
}

// ============================================================================
// Loading
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

fn read_document(path: &Path) -> Result<String, ContractError> {
    std::fs::read_to_string(path)
        .map_err(|e| ContractError::malformed(format!("{}: {e}", path.display())))
}

pub fn parse_contract(text: &str) -> Result<Feature, ContractError> {
    let document: ContractDocument =
        serde_yaml::from_str(text).map_err(|e| ContractError::malformed(e.to_string()))?;
    document.into_feature()
}

pub fn load_contract(path: &Path) -> Result<Feature, ContractError> {
    parse_contract(&read_document(path)?).map_err(|e| in_context(&path.display().to_string(), e))
}

/// A file holding one expectation or a list of them
pub fn load_expectations(path: &Path) -> Result<Vec<Expectation>, ContractError> {
    let text = read_document(path)?;
    let documents: OneOrMany<ExpectationDocument> = serde_yaml::from_str(&text)
        .map_err(|e| ContractError::Parse(format!("{}: {e}", path.display())))?;
    let documents = match documents {
        OneOrMany::Many(list) => list,
        OneOrMany::One(single) => vec![single],
    };
    documents
        .into_iter()
        .map(ExpectationDocument::into_expectation)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    const CONTRACT: &str = r#"
name: numbers
patterns:
  Number:
    number: "(number)"
scenarios:
  - name: get number
    request:
      method: GET
      path: /number/(id:number)
      headers:
        X-Trace?: "(string)"
    response:
      status: 200
      body: "(Number)"
    examples:
      - name: seven
        values:
          id: 7
"#;

    #[test]
    fn test_parse_contract() {
        let feature = parse_contract(CONTRACT).unwrap();
        assert_eq!(feature.name, "numbers");
        let scenario = &feature.scenarios[0];
        assert!(scenario.request.headers.get("x-trace").unwrap().optional);
        assert_eq!(scenario.examples[0].rows[0].field("id").as_deref(), Some("7"));

        let request = HttpRequest::new("GET", "/number/3");
        assert!(feature.lookup_scenario(&request).is_ok());
        let generated = scenario.generate_response(feature.resolver());
        let keys: Vec<&String> = generated.body.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["number"]);
    }

    #[test]
    fn test_malformed_contract() {
        let err = parse_contract("name: x\nscenarios:\n  - name: bad\n    request: {path: \"/a/(id)\"}\n    response: {}\n")
            .unwrap_err();
        assert!(matches!(err, ContractError::MalformedSpecification(_)));
        assert!(err.to_string().contains("scenario \"bad\""));
    }

    #[test]
    fn test_expectation_document() {
        let document: ExpectationDocument = serde_json::from_value(json!({
            "http-request": {"method": "post", "path": "/orders?expand=true", "body": {"item": "pen"}},
            "http-response": {"status": 201, "body": "{\"id\": 1}"},
            "delay-in-seconds": 0.5,
            "http-stub-id": "order-1"
        }))
        .unwrap();
        let expectation = document.into_expectation().unwrap();
        assert_eq!(expectation.request.method, "POST");
        assert_eq!(expectation.request.path, "/orders");
        assert_eq!(expectation.request.query["expand"], "true");
        assert_eq!(expectation.response.body, Value::from_json(json!({"id": 1})));
        assert_eq!(expectation.delay, Some(Duration::from_millis(500)));
        assert!(expectation.transient);
    }

    #[test]
    fn test_load_expectation_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"[{{"http-request": {{"path": "/a"}}, "http-response": {{"status": 204}}}},
               {{"http-request": {{"path": "/b"}}, "http-response": {{"status": 200, "body": "ok"}}}}]"#
        )
        .unwrap();
        let expectations = load_expectations(file.path()).unwrap();
        assert_eq!(expectations.len(), 2);
        assert_eq!(expectations[0].response.status, 204);
        assert_eq!(expectations[1].response.body, Value::string("ok"));
        assert!(!expectations[1].transient);
    }

    #[test]
    fn test_parse_query_string() {
        let query = parse_query_string("q=a+b&tag=x%2Cy&flag");
        assert_eq!(query["q"], "a b");
        assert_eq!(query["tag"], "x,y");
        assert_eq!(query["flag"], "");
    }
}
