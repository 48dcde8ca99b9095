//! Resource scoping: providers whose value needs deterministic release when the
//! scope that created them closes (a connection checked out of a pool, a temp file).
//!
//! Rust has no structural typing, so "a provider's return type happens to expose a
//! `close`/`release` method" (the distilled spec's source language can detect that
//! structurally) becomes a marker trait here: a provider opts in by having its value
//! type implement [`Resource`], and the registration site records that fact
//! explicitly. This is a deliberate divergence from true structural conformance,
//! recorded in DESIGN.md.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::types::AnyValue;

/// A value that must be released when its owning scope closes.
///
/// Cached provider values live behind [`AnyValue`] (`Arc<dyn Any + Send + Sync>`), so
/// release can't take the resource by unique ownership the way a plain destructor
/// would — the graph may still hold other `Arc` clones of the same value when the
/// owning scope closes (a handler finishing while a detached task keeps its own
/// clone, for instance). Release therefore takes `Arc<Self>`, not `Box<Self>`.
pub trait Resource: Send + Sync + 'static {
    /// Releases the resource. Boxed and async so both sync teardown (wrapped in a
    /// no-op future) and genuinely async teardown (closing a pooled connection) fit
    /// the same release stack.
    fn release(self: Arc<Self>) -> BoxFuture<'static, ()>;
}

/// A pending release action queued by a scope, erased over whether it came from a
/// sync closure or an async [`Resource::release`] call.
pub enum ReleaseAction {
    Sync(Box<dyn FnOnce() + Send>),
    Async(BoxFuture<'static, ()>),
}

impl ReleaseAction {
    pub fn sync(f: impl FnOnce() + Send + 'static) -> Self {
        Self::Sync(Box::new(f))
    }

    pub fn from_resource<R: Resource>(value: Arc<R>) -> Self {
        Self::Async(value.release())
    }

    pub async fn run(self) {
        match self {
            ReleaseAction::Sync(f) => f(),
            ReleaseAction::Async(fut) => fut.await,
        }
    }
}

/// Type-erased extractor, stamped in at registration time, that downcasts a
/// resolved provider value to its concrete resource type and builds the release
/// action for it. Rust has no structural typing to detect "this value happens to
/// have a `release` method" the way the distilled spec's source language can, so a
/// provider opts in explicitly by registering with [`release_extractor`].
pub type ReleaseExtractFn = Arc<dyn Fn(&AnyValue) -> ReleaseAction + Send + Sync>;

/// Builds a [`ReleaseExtractFn`] for provider values of concrete type `T`.
pub fn release_extractor<T: Resource>() -> ReleaseExtractFn {
    Arc::new(|value: &AnyValue| {
        let typed = value
            .clone()
            .downcast::<T>()
            .unwrap_or_else(|_| panic!("resource release type mismatch; this is a graph-building bug"));
        ReleaseAction::from_resource(typed)
    })
}

/// A LIFO stack of pending release actions for one scope (request or singleton).
/// Drained in reverse registration order when the scope closes, matching the
/// resource-scoping lifecycle in §5.
#[derive(Default)]
pub struct ReleaseStack(std::sync::Mutex<Vec<ReleaseAction>>);

impl ReleaseStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, action: ReleaseAction) {
        self.0.lock().unwrap().push(action);
    }

    /// Runs every queued action, most-recently-registered first, then leaves the
    /// stack empty. Safe to call multiple times; a second call is a no-op.
    pub async fn drain(&self) {
        let actions: Vec<_> = self.0.lock().unwrap().drain(..).rev().collect();
        for action in actions {
            action.run().await;
        }
    }
}
