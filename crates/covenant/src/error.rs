//! Error taxonomy for contract loading and stub registration.
//!
//! Mismatches between a contract and a request are *not* errors: they are
//! reported as [`MatchResult::Failure`](crate::result::MatchResult) values.
//! The variants here cover the cases where processing cannot continue.

use crate::result::Failures;

/// Errors raised while loading contracts or registering expectations
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// The contract itself is unusable; loading aborts before any matching
    #[error("Malformed specification: {0}")]
    MalformedSpecification(String),

    /// An example request/response pair matched none of the documented cases
    #[error("No matching scenario found for the expectation\n\n{}", .report.to_report())]
    NoMatchingScenario { report: Failures },

    /// A value given in an example row could not be parsed by its pattern
    #[error("Example value {value:?} for {name} is invalid: {reason}")]
    InvalidExampleValue {
        name: String,
        value: String,
        reason: String,
    },

    /// A deferred pattern referenced a name with no binding in the resolver
    #[error("Pattern {0} is not defined in the specification")]
    UnknownPattern(String),

    /// Wire data could not be parsed into a value
    #[error("Could not parse {0}")]
    Parse(String),
}

impl ContractError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedSpecification(message.into())
    }
}
