//! Provider identity: the keys the dependency graph and its caches are built around.
//!
//! `ProviderSpec` plays the role `TypeId` alone plays in the teacher's `state.rs`
//! global store, widened with a `kind` discriminant so two different sources or
//! providers that happen to produce the same Rust type (e.g. two `String` providers)
//! don't collide in the graph or the cache.

use std::any::TypeId;

/// Tag identifying a built-in parameter source (C2), e.g. `header`, `query_param`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceTag {
    Header,
    Headers,
    Cookie,
    QueryParam,
    QueryParams,
    PathParam,
    RawBody,
    Body,
    JsonBody,
}

/// Stable identity for a registered user provider function: its index in the
/// container's provider table. Deliberately not a function pointer — zero-sized
/// closures are not guaranteed to produce distinct pointers, so identity has to come
/// from registration order instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(pub(crate) usize);

/// What a provider node resolves from: a built-in request source, or a user function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    ParamSource(SourceTag, Option<String>),
    UserProvider(ProviderId),
}

/// Identity of a single node in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderSpec {
    pub kind: ProviderKind,
    pub target: TypeId,
}

impl ProviderSpec {
    pub fn param_source(tag: SourceTag, name: Option<String>, target: TypeId) -> Self {
        Self {
            kind: ProviderKind::ParamSource(tag, name),
            target,
        }
    }

    pub fn user_provider(id: ProviderId, target: TypeId) -> Self {
        Self {
            kind: ProviderKind::UserProvider(id),
            target,
        }
    }
}

/// Caching/lifetime behavior for a provider's resolved value (§3).
///
/// `Lazy`'s inner scope is pinned to [`Scope::Request`] rather than independently
/// configurable — the one Open Question the distilled spec left unresolved, decided
/// here as the default it itself suggested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Re-run on every reference, never cached.
    Transient,
    /// Run at most once per request, cached in the request scope.
    Request,
    /// Run at most once per process, cached in the container's singleton scope.
    Singleton,
    /// Deferred: not run until the handle is activated, then resolved (including its
    /// own subgraph) in the request scope and memoized.
    Lazy,
}

impl Scope {
    /// The scope a `Lazy` provider's subgraph is actually cached under once activated.
    pub fn effective(self) -> Scope {
        match self {
            Scope::Lazy => Scope::Request,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazy_scope_resolves_to_request() {
        assert_eq!(Scope::Lazy.effective(), Scope::Request);
        assert_eq!(Scope::Singleton.effective(), Scope::Singleton);
    }

    #[test]
    fn specs_with_different_kinds_are_distinct() {
        let a = ProviderSpec::param_source(SourceTag::Header, Some("x".into()), TypeId::of::<String>());
        let b = ProviderSpec::param_source(SourceTag::Header, Some("y".into()), TypeId::of::<String>());
        assert_ne!(a, b);
    }
}
