//! Header patterns.
//!
//! Header names are compared case-insensitively and undeclared headers are
//! always tolerated, since clients and proxies add their own. A mismatch on
//! `Content-Type` is tagged so the lookup can rank it.

use super::{
    find_header, generate_string_map, match_wire_text, string_map_negative_based_on,
    string_map_new_based_on, wire_value,
};
use crate::error::ContractError;
use crate::examples::Row;
use crate::pattern::{ObjectField, Pattern};
use crate::resolver::Resolver;
use crate::result::{FailureReason, MatchResult};
use crate::value::Value;
use indexmap::IndexMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpHeadersPattern {
    pub headers: IndexMap<String, ObjectField>,
}

impl HttpHeadersPattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, pattern: Pattern) -> Self {
        self.headers.insert(name.into(), ObjectField::mandatory(pattern));
        self
    }

    pub fn optional_header(mut self, name: impl Into<String>, pattern: Pattern) -> Self {
        self.headers.insert(name.into(), ObjectField::optional(pattern));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Declared pattern for `name`, looked up case-insensitively
    pub fn get(&self, name: &str) -> Option<&ObjectField> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, f)| f)
    }

    pub fn matches(&self, actual: &IndexMap<String, String>, resolver: &Resolver) -> MatchResult {
        let actual_keys: Vec<&str> = actual.keys().map(String::as_str).collect();
        let mut results = resolver.check_keys(
            self.headers.iter().map(|(k, f)| (k.as_str(), f.optional)),
            &actual_keys,
            true,
            "header",
            true,
        );

        for (name, field) in &self.headers {
            let Some(text) = find_header(actual, name) else {
                continue;
            };
            let result = if name.eq_ignore_ascii_case("Content-Type") {
                content_type_matches(&field.pattern, text, resolver)
                    .with_reason(FailureReason::ContentTypeMismatch)
            } else {
                match_wire_text(&field.pattern, text, resolver)
            };
            results.push(result.breadcrumb(name.as_str()));
        }

        MatchResult::all(results).breadcrumb("HEADERS")
    }

    pub fn generate(&self, resolver: &Resolver) -> IndexMap<String, String> {
        generate_string_map(&self.headers, resolver)
    }

    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Self>, ContractError> {
        Ok(string_map_new_based_on(&self.headers, row, resolver)?
            .into_iter()
            .map(|headers| Self { headers })
            .collect())
    }

    pub fn negative_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Self>, ContractError> {
        Ok(string_map_negative_based_on(&self.headers, row, resolver)?
            .into_iter()
            .map(|headers| Self { headers })
            .collect())
    }

    /// Pattern covering headers shaped like `actual`. Only declared headers
    /// are kept; each becomes mandatory.
    pub fn generalize(&self, actual: &IndexMap<String, String>, resolver: &Resolver) -> Self {
        let headers = self
            .headers
            .iter()
            .filter_map(|(name, field)| {
                let text = find_header(actual, name)?;
                let value = wire_value(&field.pattern, text, resolver);
                Some((
                    name.clone(),
                    ObjectField::mandatory(field.pattern.generalize(&value, resolver)),
                ))
            })
            .collect();
        Self { headers }
    }
}

/// Media type of a `Content-Type` value, without parameters
pub(crate) fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// An exact `Content-Type` compares media types only, so
/// `application/json; charset=utf-8` satisfies `application/json`
fn content_type_matches(pattern: &Pattern, text: &str, resolver: &Resolver) -> MatchResult {
    match pattern {
        Pattern::Exact(Value::String(expected)) => {
            if media_type(expected) == media_type(text) {
                MatchResult::Success
            } else {
                resolver.mismatch_text(&format!("\"{expected}\""), &format!("\"{text}\""))
            }
        }
        other => match_wire_text(other, text, resolver),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_names_are_case_insensitive_and_extras_allowed() {
        let resolver = Resolver::new();
        let pattern = HttpHeadersPattern::new().header("X-Request-Id", Pattern::number());
        let actual = headers(&[("x-request-id", "12"), ("User-Agent", "curl")]);
        assert!(pattern.matches(&actual, &resolver).is_success());
    }

    #[test]
    fn test_missing_and_mistyped_headers() {
        let resolver = Resolver::new();
        let pattern = HttpHeadersPattern::new()
            .header("X-Request-Id", Pattern::number())
            .optional_header("X-Trace", Pattern::string());

        let result = pattern.matches(&headers(&[]), &resolver);
        assert_eq!(result.failures().unwrap().first().path(), "HEADERS.X-Request-Id");

        let result = pattern.matches(&headers(&[("X-Request-Id", "abc")]), &resolver);
        let failure = result.failures().unwrap().first().clone();
        assert_eq!(failure.path(), "HEADERS.X-Request-Id");
        assert_eq!(
            failure.messages(),
            vec!["Contract expected number but request contained \"abc\""]
        );
    }

    #[test]
    fn test_content_type_mismatch_is_tagged() {
        let resolver = Resolver::new();
        let pattern = HttpHeadersPattern::new().header("Content-Type", Pattern::exact("application/json"));

        let charset = headers(&[("content-type", "application/json; charset=utf-8")]);
        assert!(pattern.matches(&charset, &resolver).is_success());

        let result = pattern.matches(&headers(&[("Content-Type", "text/plain")]), &resolver);
        let failures = result.failures().unwrap();
        assert!(failures.has_reason(FailureReason::ContentTypeMismatch));
        assert_eq!(failures.fluff_level(), 1);
    }

    #[test]
    fn test_variants_and_negatives() {
        let resolver = Resolver::new();
        let pattern = HttpHeadersPattern::new()
            .header("X-Count", Pattern::number())
            .optional_header("X-Trace", Pattern::string());
        assert_eq!(pattern.new_based_on(&Row::default(), &resolver).unwrap().len(), 2);

        let row = Row::from_pairs([("X-Count", "3")]);
        let narrowed = pattern.new_based_on(&row, &resolver).unwrap();
        assert!(narrowed
            .iter()
            .all(|v| v.headers["X-Count"].pattern == Pattern::Exact(Value::integer(3))));

        for negative in pattern.negative_based_on(&Row::default(), &resolver).unwrap() {
            let generated = negative.generate(&resolver);
            assert!(pattern.matches(&generated, &resolver).is_failure(), "{generated:?}");
        }
    }
}
