//! Core type aliases shared across the crate.
//!
//! Mirrors the teacher crate's `types.rs`: a handful of aliases that keep the rest of
//! the codebase free of repeated generic parameter lists.

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use hyper::body::Incoming;

/// The raw request as handed to us by the transport (hyper). The DI layer never sees
/// this type directly — [`crate::request::Request`] wraps it into the immutable view
/// described by the data model.
pub type RawRequest = hyper::Request<Incoming>;

/// The HTTP response type produced by the dispatcher.
pub type Response = hyper::Response<crate::response::ResponseBody>;

/// Internal boxed body type used while composing response bodies.
pub(crate) type BoxBody = UnsyncBoxBody<Bytes, BoxError>;

/// Boxed, thread-safe error type for body/stream plumbing.
pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Type-erased value stored in the dependency-injection caches.
pub type AnyValue = std::sync::Arc<dyn std::any::Any + Send + Sync>;
