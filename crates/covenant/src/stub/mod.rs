//! The HTTP stub: registered expectations in front of the contract.
//!
//! ## Module Structure
//!
//! - `data`: [`HttpStubData`], one registered expectation
//! - `store`: [`ExpectationStore`], transient and persistent expectations
//!   behind a lock
//! - `engine`: [`HttpStub`], which answers requests in precedence order and
//!   registers new expectations against the contracts

mod data;
mod engine;
mod store;

pub use data::HttpStubData;
pub use engine::{Expectation, HttpStub, StubReply, StubSettings};
pub use store::ExpectationStore;

/// Header carrying `success` or `failure` on every stub response
pub const RESULT_HEADER: &str = "X-Covenant-Result";
/// Header set to `random` when the response was generated from a contract
pub const TYPE_HEADER: &str = "X-Covenant-Type";
/// Header set to `true` when the stub has no contract scenarios
pub const EMPTY_HEADER: &str = "X-Covenant-Empty";
