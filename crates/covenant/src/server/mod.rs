//! HTTP front end of the stub.
//!
//! ## Module Structure
//!
//! - `listener`: accept loop, one task per connection
//! - `router`: control endpoints under `/_covenant`, everything else is
//!   answered by the [`HttpStub`](crate::stub::HttpStub)
//! - `wire`: conversion between hyper messages and the engine's
//!   [`HttpRequest`](crate::http::HttpRequest) / [`HttpResponse`](crate::http::HttpResponse)
//! - `types`: response builders shared by the router

mod listener;
mod router;
mod types;
mod wire;

pub use listener::StubServer;
pub use wire::{to_hyper_response, to_stub_request};

/// Prefix of the control endpoints
pub const CONTROL_PREFIX: &str = "/_covenant";
