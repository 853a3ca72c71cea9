//! Covenant: contract testing and API virtualization.
//!
//! A contract is a [`Feature`]: ordered [`Scenario`]s, each pairing an HTTP
//! request pattern with a response pattern. The same patterns validate live
//! traffic, generate example messages and contract tests, and back an HTTP
//! stub that serves registered expectations in front of the contract.

// ===== Type system =====
pub mod error;
pub mod examples;
pub mod pattern;
pub mod resolver;
pub mod result;
pub mod value;

pub mod feature;
pub mod http;
pub mod scenario;

// ===== Stub =====
pub mod config;
pub mod document;
pub mod server;
pub mod stub;

pub use error::ContractError;
pub use feature::{Feature, StubResponse};
pub use pattern::Pattern;
pub use resolver::Resolver;
pub use result::{Failure, Failures, MatchResult};
pub use scenario::Scenario;
pub use value::Value;
