//! Failure reporting sink.
//!
//! The "logger is one of many providers" boundary from the purpose/scope section:
//! the core never hard-codes an observability backend, it only requires something
//! that can take an [`Envelope`] and do *something* with it. Grounded in
//! `original_source`'s `StoryListener` protocol (`open`/`close`/`enqueue`), narrowed
//! to the single operation this crate actually needs.

use std::sync::Arc;

use crate::error::Envelope;

/// Where resolution failures and detached-command failures go once a response has
/// already been sent (or, for detached commands, once the caller has moved on).
pub trait FailureReporter: Send + Sync {
    fn report(&self, envelope: &Envelope);
}

/// Default reporter: emits a `tracing` event at `error` level.
///
/// Mirrors the teacher crate's own reliance on `tracing` for instrumentation
/// (`src/tracing.rs`'s `init_tracing`) rather than inventing a bespoke sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFailureReporter;

impl FailureReporter for TracingFailureReporter {
    fn report(&self, envelope: &Envelope) {
        match envelope.request_id {
            Some(id) => tracing::error!(request_id = %id, kind = %envelope.kind, "request failed"),
            None => tracing::error!(kind = %envelope.kind, "request failed"),
        }
    }
}

/// Type-erased handle to a [`FailureReporter`], shared across the container and
/// detached-command background tasks.
pub type SharedFailureReporter = Arc<dyn FailureReporter>;

pub fn default_failure_reporter() -> SharedFailureReporter {
    Arc::new(TracingFailureReporter)
}
