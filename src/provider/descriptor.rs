//! Registration-time parameter declarations (C4).
//!
//! Rust has no runtime reflection, so "inspect a parameter's annotation" (what the
//! distilled spec's source language does at import time) becomes an explicit builder
//! here: a handler or a user provider is registered together with one [`ParamDecl`]
//! per argument, each naming the dependency's [`ProviderSpec`] and whether it's lazy.
//! The graph builder (`graph.rs`) walks these declarations to build the DAG; the
//! resolver (`resolver.rs`) walks the DAG to produce a [`ResolvedArgs`] map and hands
//! it to the stored function.

use std::{any::Any, collections::HashMap, sync::Arc};

use futures_util::future::BoxFuture;

use crate::{
    error::Envelope,
    provider::{resolver::LazyValue, spec::ProviderSpec},
    types::AnyValue,
};

/// Builds the type-erased lazy handle a handler or provider actually receives, once
/// registration-time code has pinned the concrete target type `T` (see
/// [`crate::provider::resolver::Lazy`]).
pub type LazyWrapFn = Arc<dyn Fn(LazyValue) -> AnyValue + Send + Sync>;

/// One argument of a handler or user provider function.
#[derive(Clone)]
pub struct ParamDecl {
    /// Name used both for error messages and as the key into [`ResolvedArgs`].
    pub name: String,
    pub spec: ProviderSpec,
    pub is_lazy: bool,
    pub(crate) lazy_wrap: Option<LazyWrapFn>,
}

impl std::fmt::Debug for ParamDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParamDecl")
            .field("name", &self.name)
            .field("spec", &self.spec)
            .field("is_lazy", &self.is_lazy)
            .finish()
    }
}

impl ParamDecl {
    pub fn new(name: impl Into<String>, spec: ProviderSpec) -> Self {
        Self {
            name: name.into(),
            spec,
            is_lazy: false,
            lazy_wrap: None,
        }
    }

    /// Marks this parameter as lazy: the handler receives a
    /// [`crate::provider::resolver::Lazy<T>`] handle instead of the resolved value,
    /// and the underlying provider (plus its subgraph) only runs when that handle is
    /// activated.
    pub fn lazy_as<T: Send + Sync + 'static>(mut self) -> Self {
        self.is_lazy = true;
        self.lazy_wrap = Some(Arc::new(|inner: LazyValue| {
            Arc::new(crate::provider::resolver::Lazy::<T>::new(inner)) as AnyValue
        }));
        self
    }
}

/// The resolved value of every declared parameter, keyed by [`ParamDecl::name`].
///
/// Handlers and user providers pull their arguments back out of this map by name and
/// downcast to the concrete type they declared — the same `Arc<dyn Any>` erasure the
/// teacher's `state.rs` uses for its global store, scoped here to a single
/// resolution instead of the whole process.
#[derive(Default)]
pub struct ResolvedArgs(HashMap<String, AnyValue>);

impl ResolvedArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: AnyValue) {
        self.0.insert(name.into(), value);
    }

    /// Fetches and downcasts `name`, failing loudly if it's absent or the wrong type
    /// — both would be a bug in the graph builder, not a client-facing error.
    pub fn get<T: Any + Send + Sync + 'static>(&self, name: &str) -> Arc<T> {
        let value = self
            .0
            .get(name)
            .unwrap_or_else(|| panic!("resolved args missing '{name}'; this is a graph-building bug"))
            .clone();
        value
            .downcast::<T>()
            .unwrap_or_else(|_| panic!("resolved arg '{name}' has the wrong type; this is a graph-building bug"))
    }
}

/// Stable identity for a registered user provider function (its registration index).
pub type ProviderFn =
    Arc<dyn Fn(&ResolvedArgs) -> BoxFuture<'static, Result<AnyValue, Envelope>> + Send + Sync>;

/// A user-registered provider: its own dependency list plus the function that
/// consumes their resolved values to produce this provider's value.
#[derive(Clone)]
pub struct ProviderRegistration {
    pub dependencies: Vec<ParamDecl>,
    pub scope: crate::provider::spec::Scope,
    pub function: ProviderFn,
    /// True if the function should run on a blocking thread pool (§4.5 step 5)
    /// instead of inline on the async task.
    pub blocking: bool,
    /// Set when this provider's value implements [`crate::provider::resource::Resource`]
    /// (see [`ProviderRegistration::with_resource`]). The resolver runs this against
    /// the freshly-computed value and pushes the resulting action onto the scope's
    /// release stack the one time the provider actually runs.
    pub release: Option<crate::provider::resource::ReleaseExtractFn>,
}

impl ProviderRegistration {
    /// Marks this provider's value type as a [`crate::provider::resource::Resource`],
    /// wiring its release into the owning scope's release stack.
    pub fn with_resource<T: crate::provider::resource::Resource>(mut self) -> Self {
        self.release = Some(crate::provider::resource::release_extractor::<T>());
        self
    }
}

/// Stable identity for a registered handler (its registration index in the router).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub(crate) usize);

/// Signature of the function a handler's declared parameters are ultimately handed
/// to, once every [`ParamDecl`] has resolved.
pub type HandlerFn =
    Arc<dyn Fn(ResolvedArgs) -> BoxFuture<'static, crate::types::Response> + Send + Sync>;

/// A registered handler: its parameter declarations plus the function to invoke once
/// they've all resolved.
#[derive(Clone)]
pub struct HandlerDescriptor {
    pub id: HandlerId,
    pub params: Vec<ParamDecl>,
    pub invoke: HandlerFn,
}
