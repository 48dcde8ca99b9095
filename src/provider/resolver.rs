//! The resolver / scope manager (C5): walks a provider graph to produce a handler's
//! arguments, with scope-aware caching, at-most-once execution under concurrent
//! demand, lazy activation, and deterministic resource release.
//!
//! The request and singleton caches are both `DashMap<ProviderSpec, CacheSlot>` where
//! `CacheSlot` wraps a `tokio::sync::OnceCell`. This is the single biggest structural
//! borrow from the teacher crate: `state.rs`'s `DashMap<TypeId, Arc<dyn Any>>` global
//! store, generalized from a type-keyed single slot per process to a spec-keyed slot
//! per scope, with `OnceCell` replacing a plain insert so a second concurrent demand
//! for the same spec awaits the same in-flight resolution instead of racing it —
//! collapsing "request cache" and "in-flight de-duplication" into one structure.

use std::{collections::HashMap, marker::PhantomData, sync::Arc};

use dashmap::DashMap;
use futures_util::future::{join_all, BoxFuture};
use tokio::sync::OnceCell;

use crate::{
    error::Envelope,
    provider::{
        descriptor::{ParamDecl, ResolvedArgs},
        graph::{Graph, ProviderNode},
        resource::ReleaseStack,
        spec::{ProviderSpec, Scope},
    },
    request::Request,
    types::AnyValue,
};

type Slot = Arc<OnceCell<Result<AnyValue, Envelope>>>;

/// A scope-local cache: one slot per provider spec first demanded in this scope.
#[derive(Default)]
pub struct ScopeCache(DashMap<ProviderSpec, Slot>);

impl ScopeCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot_for(&self, spec: &ProviderSpec) -> Slot {
        self.0.entry(spec.clone()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
    }
}

/// Everything scoped to a single in-flight request: its own cache, its own release
/// stack, and the request view itself.
pub struct RequestScope {
    pub request: Arc<Request>,
    cache: ScopeCache,
    pub release: ReleaseStack,
}

impl RequestScope {
    pub fn new(request: Arc<Request>) -> Self {
        Self {
            request,
            cache: ScopeCache::new(),
            release: ReleaseStack::new(),
        }
    }

    /// Runs every queued resource release for this request, most-recent-first.
    pub async fn close(&self) {
        self.release.drain().await;
    }
}

/// The cache and release stack shared by every request against one [`crate::container::Container`].
/// Bundled together (rather than a bare `ScopeCache`) so a singleton-scoped provider
/// whose value is a [`crate::provider::resource::Resource`] has somewhere to register
/// its release — it only ever runs once, at process shutdown.
#[derive(Default)]
pub struct SingletonScope {
    cache: ScopeCache,
    pub release: ReleaseStack,
}

impl SingletonScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every queued singleton release, most-recent-first. Intended to be called
    /// once, at container shutdown.
    pub async fn close(&self) {
        self.release.drain().await;
    }
}

/// Which scope's release stack a freshly-computed provider value's release action
/// (if any) is pushed onto.
#[derive(Clone, Copy)]
enum ReleaseTarget {
    Request,
    Singleton,
}

/// A deferred handle over a provider's value: the underlying subgraph isn't resolved
/// until [`LazyValue::activate`] (or, for the typed wrapper, [`Lazy::get`]) is
/// called, matching `Annotated[Awaitable[T], provider, "lazy"]`'s "not called until
/// awaited" semantics. Once activated, the result is memoized — a second activation
/// returns the same value without re-running anything.
#[derive(Clone)]
pub struct LazyValue {
    once: Slot,
    activate: Arc<dyn Fn() -> BoxFuture<'static, Result<AnyValue, Envelope>> + Send + Sync>,
}

impl LazyValue {
    fn new(activate: Arc<dyn Fn() -> BoxFuture<'static, Result<AnyValue, Envelope>> + Send + Sync>) -> Self {
        Self {
            once: Arc::new(OnceCell::new()),
            activate,
        }
    }

    pub async fn activate(&self) -> Result<AnyValue, Envelope> {
        self.once.get_or_init(|| (self.activate)()).await.clone()
    }
}

/// The typed handle a handler or provider actually declares as a parameter type for
/// a lazy dependency.
pub struct Lazy<T> {
    inner: LazyValue,
    _marker: PhantomData<T>,
}

impl<T: Send + Sync + 'static> Lazy<T> {
    pub(crate) fn new(inner: LazyValue) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Activates the underlying subgraph on first call and returns the resolved
    /// value; later calls return the memoized result.
    pub async fn get(&self) -> Result<Arc<T>, Envelope> {
        let value = self.inner.activate().await?;
        Ok(value
            .downcast::<T>()
            .unwrap_or_else(|_| panic!("lazy value type mismatch; this is a graph-building bug")))
    }
}

/// Resolves every declared parameter of a handler (or a user provider's own
/// dependency list) against `graph`, producing the [`ResolvedArgs`] map the function
/// is ultimately called with.
///
/// Siblings are resolved concurrently via `join_all`; nothing here buffers or awaits
/// more than its own declared dependencies, so a diamond-shaped subgraph still only
/// runs each cached node once regardless of how many siblings reference it.
pub async fn resolve_params(
    params: &[ParamDecl],
    graph: &Arc<Graph>,
    request_scope: &Arc<RequestScope>,
    singleton_scope: &Arc<SingletonScope>,
) -> Result<ResolvedArgs, Envelope> {
    let futures = params.iter().map(|param| {
        let graph = graph.clone();
        let request_scope = request_scope.clone();
        let singleton_scope = singleton_scope.clone();
        let param = param.clone();
        async move {
            let value = if param.is_lazy {
                resolve_lazy(&param, graph, request_scope, singleton_scope)
            } else {
                resolve_spec(param.spec.clone(), graph, request_scope, singleton_scope).await?
            };
            Ok::<_, Envelope>((param.name, value))
        }
    });

    let mut args = ResolvedArgs::new();
    for result in join_all(futures).await {
        let (name, value) = result?;
        args.insert(name, value);
    }
    Ok(args)
}

fn resolve_lazy(
    param: &ParamDecl,
    graph: Arc<Graph>,
    request_scope: Arc<RequestScope>,
    singleton_scope: Arc<SingletonScope>,
) -> AnyValue {
    let spec = param.spec.clone();

    let activate: Arc<dyn Fn() -> BoxFuture<'static, Result<AnyValue, Envelope>> + Send + Sync> =
        Arc::new(move || {
            let spec = spec.clone();
            let graph = graph.clone();
            let request_scope = request_scope.clone();
            let singleton_scope = singleton_scope.clone();
            Box::pin(async move { resolve_spec(spec, graph, request_scope, singleton_scope).await })
        });

    let lazy_value = LazyValue::new(activate);
    match &param.lazy_wrap {
        Some(wrap) => wrap(lazy_value),
        None => Arc::new(lazy_value) as AnyValue,
    }
}

/// Resolves a single provider spec, applying scope-aware caching: `Transient` never
/// caches, `Request`/`Lazy` (pinned to `Request`, see `Scope::effective`) cache in
/// `request_scope`, `Singleton` caches in `singleton_scope`. Whichever branch actually
/// runs the provider also registers its release action (if the provider opted into
/// [`crate::provider::resource::Resource`]) on the owning scope's release stack,
/// exactly once, the one time the provider's function runs.
pub fn resolve_spec(
    spec: ProviderSpec,
    graph: Arc<Graph>,
    request_scope: Arc<RequestScope>,
    singleton_scope: Arc<SingletonScope>,
) -> BoxFuture<'static, Result<AnyValue, Envelope>> {
    Box::pin(async move {
        let node = graph
            .nodes
            .get(&spec)
            .ok_or_else(|| Envelope::internal(anyhow::anyhow!("missing graph node for provider spec")))?
            .clone();

        match node.scope().effective() {
            Scope::Transient => {
                run_node_with_release(node, graph, request_scope, singleton_scope, ReleaseTarget::Request).await
            }
            Scope::Request => {
                let slot = request_scope.cache.slot_for(&spec);
                slot.get_or_init(|| {
                    run_node_with_release(node, graph, request_scope.clone(), singleton_scope, ReleaseTarget::Request)
                })
                .await
                .clone()
            }
            Scope::Singleton => {
                let slot = singleton_scope.cache.slot_for(&spec);
                slot.get_or_init(|| {
                    run_node_with_release(node, graph, request_scope, singleton_scope.clone(), ReleaseTarget::Singleton)
                })
                .await
                .clone()
            }
            Scope::Lazy => unreachable!("Scope::effective never returns Lazy"),
        }
    })
}

async fn run_node_with_release(
    node: Arc<ProviderNode>,
    graph: Arc<Graph>,
    request_scope: Arc<RequestScope>,
    singleton_scope: Arc<SingletonScope>,
    target: ReleaseTarget,
) -> Result<AnyValue, Envelope> {
    let result = run_node(node.clone(), graph, request_scope.clone(), singleton_scope.clone()).await;
    if let (ProviderNode::User { release: Some(extract), .. }, Ok(value)) = (node.as_ref(), &result) {
        let action = extract(value);
        match target {
            ReleaseTarget::Request => request_scope.release.push(action),
            ReleaseTarget::Singleton => singleton_scope.release.push(action),
        }
    }
    result
}

async fn run_node(
    node: Arc<ProviderNode>,
    graph: Arc<Graph>,
    request_scope: Arc<RequestScope>,
    singleton_scope: Arc<SingletonScope>,
) -> Result<AnyValue, Envelope> {
    match node.as_ref() {
        ProviderNode::Source { function, .. } => function(request_scope.request.clone()).await,
        ProviderNode::User {
            dependencies,
            function,
            blocking,
            ..
        } => {
            let args = resolve_params(dependencies, &graph, &request_scope, &singleton_scope).await?;
            if *blocking {
                let function = function.clone();
                tokio::task::spawn_blocking(move || futures_util::executor::block_on(function(&args)))
                    .await
                    .map_err(|e| Envelope::internal(anyhow::anyhow!("blocking provider panicked: {e}")))?
            } else {
                function(&args).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{
        descriptor::HandlerDescriptor,
        graph::{GraphBuilder, Registry},
        mock::MockMap,
        spec::SourceTag,
    };
    use std::{
        any::TypeId,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    };

    fn counting_source(counter: Arc<AtomicUsize>) -> crate::provider::source::SourceFn {
        Arc::new(move |_req| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(1_i64) as AnyValue)
            })
        })
    }

    fn test_request() -> Arc<Request> {
        Arc::new(crate::request::test_support::from_query("", HashMap::new()))
    }

    #[tokio::test]
    async fn request_scoped_provider_runs_once_per_request() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::default();
        let spec = ProviderSpec::param_source(SourceTag::QueryParam, Some("q".into()), TypeId::of::<i64>());
        registry.register_source(spec.clone(), Scope::Request, counting_source(counter.clone()));

        let descriptor = HandlerDescriptor {
            id: crate::provider::descriptor::HandlerId(0),
            params: vec![
                ParamDecl::new("a", spec.clone()),
                ParamDecl::new("b", spec.clone()),
            ],
            invoke: Arc::new(|_| Box::pin(async { unreachable!() })),
        };

        let graph = GraphBuilder::new()
            .build(&registry, &descriptor, &MockMap::empty())
            .unwrap();
        let request_scope = Arc::new(RequestScope::new(test_request()));
        let singleton_scope = Arc::new(SingletonScope::new());

        let args = resolve_params(&descriptor.params, &graph, &request_scope, &singleton_scope)
            .await
            .unwrap();

        assert_eq!(*args.get::<i64>("a"), 1);
        assert_eq!(*args.get::<i64>("b"), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_provider_runs_once_per_reference() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::default();
        let spec = ProviderSpec::param_source(SourceTag::QueryParam, Some("q".into()), TypeId::of::<i64>());
        registry.register_source(spec.clone(), Scope::Transient, counting_source(counter.clone()));

        let descriptor = HandlerDescriptor {
            id: crate::provider::descriptor::HandlerId(1),
            params: vec![
                ParamDecl::new("a", spec.clone()),
                ParamDecl::new("b", spec.clone()),
            ],
            invoke: Arc::new(|_| Box::pin(async { unreachable!() })),
        };

        let graph = GraphBuilder::new()
            .build(&registry, &descriptor, &MockMap::empty())
            .unwrap();
        let request_scope = Arc::new(RequestScope::new(test_request()));
        let singleton_scope = Arc::new(SingletonScope::new());

        resolve_params(&descriptor.params, &graph, &request_scope, &singleton_scope)
            .await
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn singleton_provider_persists_across_two_request_scopes() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::default();
        let spec = ProviderSpec::param_source(SourceTag::QueryParam, Some("q".into()), TypeId::of::<i64>());
        registry.register_source(spec.clone(), Scope::Singleton, counting_source(counter.clone()));

        let descriptor = HandlerDescriptor {
            id: crate::provider::descriptor::HandlerId(2),
            params: vec![ParamDecl::new("a", spec.clone())],
            invoke: Arc::new(|_| Box::pin(async { unreachable!() })),
        };

        let graph = GraphBuilder::new()
            .build(&registry, &descriptor, &MockMap::empty())
            .unwrap();
        let singleton_scope = Arc::new(SingletonScope::new());

        for _ in 0..2 {
            let request_scope = Arc::new(RequestScope::new(test_request()));
            resolve_params(&descriptor.params, &graph, &request_scope, &singleton_scope)
                .await
                .unwrap();
        }

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn lazy_provider_does_not_run_until_activated() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::default();
        let spec = ProviderSpec::param_source(SourceTag::QueryParam, Some("q".into()), TypeId::of::<i64>());
        registry.register_source(spec.clone(), Scope::Request, counting_source(counter.clone()));

        let descriptor = HandlerDescriptor {
            id: crate::provider::descriptor::HandlerId(3),
            params: vec![ParamDecl::new("a", spec.clone()).lazy_as::<i64>()],
            invoke: Arc::new(|_| Box::pin(async { unreachable!() })),
        };

        let graph = GraphBuilder::new()
            .build(&registry, &descriptor, &MockMap::empty())
            .unwrap();
        let request_scope = Arc::new(RequestScope::new(test_request()));
        let singleton_scope = Arc::new(SingletonScope::new());

        let args = resolve_params(&descriptor.params, &graph, &request_scope, &singleton_scope)
            .await
            .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        let lazy = args.get::<Lazy<i64>>("a");
        let value = lazy.get().await.unwrap();
        assert_eq!(*value, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let value_again = lazy.get().await.unwrap();
        assert_eq!(*value_again, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn diamond_dependency_runs_shared_request_scoped_provider_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::default();
        let base = ProviderSpec::param_source(SourceTag::QueryParam, Some("base".into()), TypeId::of::<i64>());
        registry.register_source(base.clone(), Scope::Request, counting_source(counter.clone()));

        let dep_a = crate::provider::spec::ProviderId(0);
        let dep_a_spec = ProviderSpec::user_provider(dep_a, TypeId::of::<i64>());
        registry.register_provider(crate::provider::descriptor::ProviderRegistration {
            dependencies: vec![ParamDecl::new("base", base.clone())],
            scope: Scope::Request,
            function: Arc::new(|args: &ResolvedArgs| {
                let base = *args.get::<i64>("base");
                Box::pin(async move { Ok(Arc::new(base + 1) as AnyValue) })
            }),
            blocking: false,
            release: None,
        });

        let dep_b = crate::provider::spec::ProviderId(1);
        let dep_b_spec = ProviderSpec::user_provider(dep_b, TypeId::of::<i64>());
        registry.register_provider(crate::provider::descriptor::ProviderRegistration {
            dependencies: vec![ParamDecl::new("base", base.clone())],
            scope: Scope::Request,
            function: Arc::new(|args: &ResolvedArgs| {
                let base = *args.get::<i64>("base");
                Box::pin(async move { Ok(Arc::new(base + 2) as AnyValue) })
            }),
            blocking: false,
            release: None,
        });

        let descriptor = HandlerDescriptor {
            id: crate::provider::descriptor::HandlerId(4),
            params: vec![
                ParamDecl::new("a", dep_a_spec),
                ParamDecl::new("b", dep_b_spec),
            ],
            invoke: Arc::new(|_| Box::pin(async { unreachable!() })),
        };

        let graph = GraphBuilder::new()
            .build(&registry, &descriptor, &MockMap::empty())
            .unwrap();
        let request_scope = Arc::new(RequestScope::new(test_request()));
        let singleton_scope = Arc::new(SingletonScope::new());

        let args = resolve_params(&descriptor.params, &graph, &request_scope, &singleton_scope)
            .await
            .unwrap();

        assert_eq!(*args.get::<i64>("a"), 2);
        assert_eq!(*args.get::<i64>("b"), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    struct Pooled(Arc<Mutex<Vec<&'static str>>>);

    impl crate::provider::resource::Resource for Pooled {
        fn release(self: Arc<Self>) -> BoxFuture<'static, ()> {
            Box::pin(async move {
                self.0.lock().unwrap().push("released");
            })
        }
    }

    #[tokio::test]
    async fn request_scoped_resource_releases_exactly_once_on_scope_close() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = Registry::default();
        let pooled = crate::provider::spec::ProviderId(0);
        let pooled_spec = ProviderSpec::user_provider(pooled, TypeId::of::<Pooled>());
        {
            let log = log.clone();
            registry.register_provider(
                crate::provider::descriptor::ProviderRegistration {
                    dependencies: vec![],
                    scope: Scope::Request,
                    function: Arc::new(move |_args: &ResolvedArgs| {
                        let log = log.clone();
                        Box::pin(async move { Ok(Arc::new(Pooled(log)) as AnyValue) })
                    }),
                    blocking: false,
                    release: None,
                }
                .with_resource::<Pooled>(),
            );
        }

        let descriptor = HandlerDescriptor {
            id: crate::provider::descriptor::HandlerId(5),
            params: vec![ParamDecl::new("p", pooled_spec.clone()), ParamDecl::new("q", pooled_spec)],
            invoke: Arc::new(|_| Box::pin(async { unreachable!() })),
        };

        let graph = GraphBuilder::new()
            .build(&registry, &descriptor, &MockMap::empty())
            .unwrap();
        let request_scope = Arc::new(RequestScope::new(test_request()));
        let singleton_scope = Arc::new(SingletonScope::new());

        resolve_params(&descriptor.params, &graph, &request_scope, &singleton_scope)
            .await
            .unwrap();
        assert!(log.lock().unwrap().is_empty());

        request_scope.close().await;
        assert_eq!(*log.lock().unwrap(), vec!["released"]);

        // A second close is a no-op; release doesn't run twice for one acquisition.
        request_scope.close().await;
        assert_eq!(*log.lock().unwrap(), vec!["released"]);
    }

    #[tokio::test]
    async fn singleton_resource_releases_once_across_two_requests_at_container_shutdown() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = Registry::default();
        let pooled = crate::provider::spec::ProviderId(0);
        let pooled_spec = ProviderSpec::user_provider(pooled, TypeId::of::<Pooled>());
        {
            let log = log.clone();
            registry.register_provider(
                crate::provider::descriptor::ProviderRegistration {
                    dependencies: vec![],
                    scope: Scope::Singleton,
                    function: Arc::new(move |_args: &ResolvedArgs| {
                        let log = log.clone();
                        Box::pin(async move { Ok(Arc::new(Pooled(log)) as AnyValue) })
                    }),
                    blocking: false,
                    release: None,
                }
                .with_resource::<Pooled>(),
            );
        }

        let descriptor = HandlerDescriptor {
            id: crate::provider::descriptor::HandlerId(6),
            params: vec![ParamDecl::new("p", pooled_spec)],
            invoke: Arc::new(|_| Box::pin(async { unreachable!() })),
        };

        let graph = GraphBuilder::new()
            .build(&registry, &descriptor, &MockMap::empty())
            .unwrap();
        let singleton_scope = Arc::new(SingletonScope::new());

        for _ in 0..2 {
            let request_scope = Arc::new(RequestScope::new(test_request()));
            resolve_params(&descriptor.params, &graph, &request_scope, &singleton_scope)
                .await
                .unwrap();
            request_scope.close().await;
        }
        assert!(log.lock().unwrap().is_empty());

        singleton_scope.close().await;
        assert_eq!(*log.lock().unwrap(), vec!["released"]);
    }
}
