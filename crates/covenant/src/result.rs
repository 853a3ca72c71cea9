//! Match results and breadcrumbed failure reports.
//!
//! Every match operation returns a [`MatchResult`]. A failure carries a
//! breadcrumb (one path segment per nesting layer), an optional nested cause
//! and an optional [`FailureReason`] tag. Layers wrap inner failures with
//! their own breadcrumb, so the rendered path reads outside-in, e.g.
//! `REQUEST.BODY.user.age`.

use serde::Serialize;
use std::fmt;

/// Tag describing the kind of mismatch, used to rank failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureReason {
    PartNameMismatch,
    UrlPathMismatch,
    UrlPathParamMismatchButSameStructure,
    SoapActionMismatch,
    MethodMismatch,
    ContentTypeMismatch,
    StatusMismatch,
    FactMismatch,
}

impl FailureReason {
    /// How little the mismatch tells the caller. Level 2 failures are pure
    /// shape noise (wrong path, wrong method); level 0 failures are
    /// informative (a body or header was wrong in a request aimed at the
    /// right operation).
    pub fn fluff_level(self) -> u8 {
        match self {
            FailureReason::UrlPathMismatch
            | FailureReason::SoapActionMismatch
            | FailureReason::MethodMismatch => 2,
            FailureReason::UrlPathParamMismatchButSameStructure
            | FailureReason::ContentTypeMismatch
            | FailureReason::StatusMismatch => 1,
            FailureReason::PartNameMismatch | FailureReason::FactMismatch => 0,
        }
    }
}

/// A single mismatch, possibly wrapped by outer layers
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub message: String,
    pub breadcrumb: String,
    pub cause: Option<Box<Failure>>,
    pub reason: Option<FailureReason>,
    pub scenario: Option<String>,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            breadcrumb: String::new(),
            cause: None,
            reason: None,
            scenario: None,
        }
    }

    /// Wrap this failure in an outer layer named `breadcrumb`
    pub fn wrap(self, breadcrumb: impl Into<String>) -> Self {
        let reason = self.reason;
        let scenario = self.scenario.clone();
        Self {
            message: String::new(),
            breadcrumb: breadcrumb.into(),
            cause: Some(Box::new(self)),
            reason,
            scenario,
        }
    }

    /// Breadcrumbs from the outermost layer inwards
    pub fn breadcrumbs(&self) -> Vec<&str> {
        let mut crumbs = Vec::new();
        let mut current = Some(self);
        while let Some(failure) = current {
            if !failure.breadcrumb.is_empty() {
                crumbs.push(failure.breadcrumb.as_str());
            }
            current = failure.cause.as_deref();
        }
        crumbs
    }

    /// Dotted path, with index segments such as `[0]` attached without a dot
    pub fn path(&self) -> String {
        let mut path = String::new();
        for crumb in self.breadcrumbs() {
            if !path.is_empty() && !crumb.starts_with('[') {
                path.push('.');
            }
            path.push_str(crumb);
        }
        path
    }

    pub fn messages(&self) -> Vec<&str> {
        let mut messages = Vec::new();
        let mut current = Some(self);
        while let Some(failure) = current {
            if !failure.message.is_empty() {
                messages.push(failure.message.as_str());
            }
            current = failure.cause.as_deref();
        }
        messages
    }

    /// Highest fluff level tagged anywhere along the cause chain
    pub fn fluff_level(&self) -> u8 {
        let mut level = 0;
        let mut current = Some(self);
        while let Some(failure) = current {
            if let Some(reason) = failure.reason {
                level = level.max(reason.fluff_level());
            }
            current = failure.cause.as_deref();
        }
        level
    }

    pub fn has_reason(&self, reason: FailureReason) -> bool {
        let mut current = Some(self);
        while let Some(failure) = current {
            if failure.reason == Some(reason) {
                return true;
            }
            current = failure.cause.as_deref();
        }
        false
    }

    pub fn details(&self) -> FailureDetails {
        FailureDetails {
            scenario: self.scenario.clone(),
            path: self.path(),
            breadcrumbs: self.breadcrumbs().into_iter().map(String::from).collect(),
            messages: self.messages().into_iter().map(String::from).collect(),
            reason: self.reason,
        }
    }

    pub fn to_report(&self) -> String {
        let mut out = String::new();
        if let Some(scenario) = &self.scenario {
            out.push_str(&format!("In scenario \"{scenario}\"\n"));
        }
        let path = self.path();
        if !path.is_empty() {
            out.push_str(&format!(">> {path}\n\n"));
        }
        let messages = self.messages();
        for message in messages {
            out.push_str(&format!("   {message}\n"));
        }
        out.trim_end().to_string()
    }
}

/// Flattened, serializable view of a failure for report renderers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    pub path: String,
    pub breadcrumbs: Vec<String>,
    pub messages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
}

/// One or more failures merged into a single report
#[derive(Debug, Clone, PartialEq)]
pub struct Failures(Vec<Failure>);

impl Failures {
    pub fn single(failure: Failure) -> Self {
        Self(vec![failure])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Failure> {
        self.0.iter()
    }

    pub fn first(&self) -> &Failure {
        // Failures is never constructed empty
        &self.0[0]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<Failure> {
        self.0
    }

    pub fn merge(mut self, other: Failures) -> Self {
        self.0.extend(other.0);
        self
    }

    /// Fluff level of the report: the least fluffy failure decides
    pub fn fluff_level(&self) -> u8 {
        self.0.iter().map(Failure::fluff_level).min().unwrap_or(0)
    }

    pub fn is_fluffy(&self, acceptable_level: u8) -> bool {
        self.fluff_level() > acceptable_level
    }

    pub fn has_reason(&self, reason: FailureReason) -> bool {
        self.0.iter().any(|f| f.has_reason(reason))
    }

    fn map(self, f: impl Fn(Failure) -> Failure) -> Self {
        Self(self.0.into_iter().map(f).collect())
    }

    pub fn details(&self) -> Vec<FailureDetails> {
        self.0.iter().map(Failure::details).collect()
    }

    pub fn to_report(&self) -> String {
        self.0
            .iter()
            .map(Failure::to_report)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl IntoIterator for Failures {
    type Item = Failure;
    type IntoIter = std::vec::IntoIter<Failure>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Outcome of matching a value, message or scenario
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    Success,
    Failure(Failures),
}

impl MatchResult {
    pub fn failure(message: impl Into<String>) -> Self {
        MatchResult::Failure(Failures::single(Failure::new(message)))
    }

    pub fn failure_with_reason(message: impl Into<String>, reason: FailureReason) -> Self {
        MatchResult::failure(message).with_reason(reason)
    }

    pub fn from_failure(failure: Failure) -> Self {
        MatchResult::Failure(Failures::single(failure))
    }

    /// Aggregate a set of results; failures are merged into one report
    pub fn all(results: impl IntoIterator<Item = MatchResult>) -> Self {
        let mut collected: Vec<Failure> = Vec::new();
        for result in results {
            if let MatchResult::Failure(failures) = result {
                collected.extend(failures);
            }
        }
        if collected.is_empty() {
            MatchResult::Success
        } else {
            MatchResult::Failure(Failures(collected))
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, MatchResult::Success)
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// Short-circuiting bind: evaluate `next` only when this result succeeded
    pub fn and_then(self, next: impl FnOnce() -> MatchResult) -> MatchResult {
        match self {
            MatchResult::Success => next(),
            failure => failure,
        }
    }

    /// Evaluate `fallback` only when this result failed
    pub fn or_else(self, fallback: impl FnOnce(Failures) -> MatchResult) -> MatchResult {
        match self {
            MatchResult::Success => MatchResult::Success,
            MatchResult::Failure(failures) => fallback(failures),
        }
    }

    pub fn breadcrumb(self, crumb: impl Into<String>) -> Self {
        match self {
            MatchResult::Success => MatchResult::Success,
            MatchResult::Failure(failures) => {
                let crumb = crumb.into();
                MatchResult::Failure(failures.map(|f| f.wrap(crumb.clone())))
            }
        }
    }

    pub fn with_reason(self, reason: FailureReason) -> Self {
        match self {
            MatchResult::Success => MatchResult::Success,
            MatchResult::Failure(failures) => MatchResult::Failure(failures.map(|mut f| {
                f.reason = Some(reason);
                f
            })),
        }
    }

    pub fn with_scenario(self, name: &str) -> Self {
        match self {
            MatchResult::Success => MatchResult::Success,
            MatchResult::Failure(failures) => MatchResult::Failure(failures.map(|mut f| {
                f.scenario = Some(name.to_string());
                f
            })),
        }
    }

    pub fn failures(&self) -> Option<&Failures> {
        match self {
            MatchResult::Success => None,
            MatchResult::Failure(failures) => Some(failures),
        }
    }

    pub fn report(&self) -> String {
        match self {
            MatchResult::Success => String::new(),
            MatchResult::Failure(failures) => failures.to_report(),
        }
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchResult::Success => write!(f, "success"),
            MatchResult::Failure(failures) => write!(f, "{}", failures.to_report()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breadcrumb_path_reads_outside_in() {
        let result = MatchResult::failure("Expected number, actual was \"ten\"")
            .breadcrumb("age")
            .breadcrumb("[0]")
            .breadcrumb("users")
            .breadcrumb("BODY")
            .breadcrumb("REQUEST");
        let failure = result.failures().unwrap().first();
        assert_eq!(failure.path(), "REQUEST.BODY.users[0].age");
        assert_eq!(failure.messages(), vec!["Expected number, actual was \"ten\""]);
    }

    #[test]
    fn test_report_format() {
        let result = MatchResult::failure("Key named \"x\" was not in the specification")
            .breadcrumb("x")
            .breadcrumb("BODY");
        assert_eq!(
            result.report(),
            ">> BODY.x\n\n   Key named \"x\" was not in the specification"
        );
    }

    #[test]
    fn test_all_merges_failures() {
        let merged = MatchResult::all(vec![
            MatchResult::Success,
            MatchResult::failure("a").breadcrumb("A"),
            MatchResult::failure("b").breadcrumb("B"),
        ]);
        assert_eq!(merged.failures().unwrap().len(), 2);
        assert!(MatchResult::all(vec![MatchResult::Success]).is_success());
    }

    #[test]
    fn test_and_then_short_circuits() {
        let mut called = false;
        let result = MatchResult::failure("stop").and_then(|| {
            called = true;
            MatchResult::Success
        });
        assert!(result.is_failure());
        assert!(!called);
    }

    #[test]
    fn test_fluff_level_survives_wrapping() {
        let result = MatchResult::failure_with_reason("wrong path", FailureReason::UrlPathMismatch)
            .breadcrumb("PATH")
            .breadcrumb("REQUEST");
        let failures = result.failures().unwrap();
        assert_eq!(failures.fluff_level(), 2);
        assert!(failures.is_fluffy(0));
        assert!(failures.has_reason(FailureReason::UrlPathMismatch));

        let body = MatchResult::failure("bad body").breadcrumb("BODY");
        assert!(!body.failures().unwrap().is_fluffy(0));
    }
}
