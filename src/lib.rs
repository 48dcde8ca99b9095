#![cfg_attr(docsrs, feature(doc_cfg))]

//! A typed, scoped, cacheable dependency-injection framework for HTTP handlers.
//!
//! The core is a resolver that, given a handler's declared parameters and an
//! incoming request, builds a dependency DAG of providers, honors per-scope
//! caching (transient / request / singleton / lazy), resolves concurrently, and
//! delivers a fully-materialized argument list to the handler — plus a scoped
//! resource-release stack so providers that acquire resources release them
//! deterministically.
//!
//! # Key concepts
//! - [`provider::spec::ProviderSpec`] is a DAG node's identity.
//! - [`provider::graph::GraphBuilder`] turns a handler's declared parameters into a
//!   DAG, cached per (handler, active mock map).
//! - [`provider::resolver`] walks that DAG for one request: scope-aware caching,
//!   at-most-once execution under concurrent demand, lazy activation, and release.
//! - [`container::Container`] owns the provider registry, the graph cache, and the
//!   singleton scope shared across every request.
//! - [`dispatch::dispatcher::Dispatcher`] matches a request to a route, drives the
//!   resolver, and adapts the handler's return value into a response.
//!
//! # Feature flags
//! - `skein-tracing` — structured tracing subscriber ([`tracing::init_tracing`]).

/// Container configuration.
pub mod config;

/// Value coercion from raw request data into declared semantic types (C3).
pub mod coerce;

/// The dependency-injection container tying registry, graph cache, and singleton
/// scope together.
pub mod container;

/// Route matching and request dispatch (C6).
pub mod dispatch;

/// The closed error taxonomy and its HTTP status mapping (C7).
pub mod error;

/// Failure reporting sink for resolution and detached-command failures.
pub mod failure;

/// The dependency-injection core: provider identity, graph construction, and the
/// resolver/scope manager (C2/C4/C5).
pub mod provider;

/// Convenience re-exports for embedding this crate's container in a binary.
pub mod prelude;

/// The request model (C1).
pub mod request;

/// Response body composition and streaming.
pub mod response;

/// HTTP server bootstrap.
pub mod server;

/// Structured tracing subscriber setup.
#[cfg(feature = "skein-tracing")]
#[cfg_attr(docsrs, doc(cfg(feature = "skein-tracing")))]
pub mod tracing;

/// Core type aliases shared across the crate.
pub mod types;

pub use container::Container;
pub use error::{Envelope, ErrorKind};
pub use http::Method;
