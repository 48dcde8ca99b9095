//! The container: ties configuration, the provider registry, the graph builder, and
//! the singleton scope together into the one long-lived object a server process
//! builds once and shares across every connection.
//!
//! Registration (`register_provider`/`register_source`) happens once at startup, so
//! the registry sits behind a `parking_lot::RwLock` rather than anything fancier —
//! the same trade-off the teacher crate makes for its router's middleware list
//! (`RwLock<Vec<BoxMiddleware>>` in `router.rs`), optimized for many readers and rare
//! writers.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
    config::ContainerConfig,
    error::Envelope,
    failure::{default_failure_reporter, SharedFailureReporter},
    provider::{
        descriptor::{HandlerDescriptor, ProviderRegistration, ResolvedArgs},
        graph::{GraphBuilder, GraphError, Registry},
        mock,
        resolver::{self, RequestScope, SingletonScope},
        source::SourceFn,
        spec::{ProviderId, ProviderSpec, Scope},
    },
    request::Request,
};

pub struct Container {
    config: ContainerConfig,
    registry: RwLock<Registry>,
    graph_builder: GraphBuilder,
    singleton_scope: Arc<SingletonScope>,
    failure_reporter: SharedFailureReporter,
}

impl Container {
    pub fn new(config: ContainerConfig) -> Self {
        Self {
            config,
            registry: RwLock::new(Registry::default()),
            graph_builder: GraphBuilder::new(),
            singleton_scope: Arc::new(SingletonScope::new()),
            failure_reporter: default_failure_reporter(),
        }
    }

    pub fn with_failure_reporter(mut self, reporter: SharedFailureReporter) -> Self {
        self.failure_reporter = reporter;
        self
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    pub fn failure_reporter(&self) -> &SharedFailureReporter {
        &self.failure_reporter
    }

    pub fn register_provider(&self, registration: ProviderRegistration) -> ProviderId {
        self.registry.write().register_provider(registration)
    }

    pub fn register_source(&self, spec: ProviderSpec, scope: Scope, function: SourceFn) {
        self.registry.write().register_source(spec, scope, function);
    }

    /// Resolves every parameter of `descriptor` for one in-flight request, honoring
    /// the container's configured per-route deadline (§5).
    ///
    /// Returns the resolved arguments alongside the [`RequestScope`] that produced
    /// them — the dispatcher is responsible for calling [`RequestScope::close`] once
    /// the handler's response has been produced, so resources release deterministically
    /// even though this function can't know when that point is.
    pub async fn resolve(
        &self,
        descriptor: &HandlerDescriptor,
        request: Arc<Request>,
    ) -> Result<(ResolvedArgs, Arc<RequestScope>), Envelope> {
        let request_id = request.request_id();
        let mocks = mock::active_mocks();
        let graph = {
            let registry = self.registry.read();
            self.graph_builder
                .build(&registry, descriptor, &mocks)
                .map_err(|e| graph_error_to_envelope(e, request_id))?
        };

        let request_scope = Arc::new(RequestScope::new(request));
        let resolve_fut = resolver::resolve_params(&descriptor.params, &graph, &request_scope, &self.singleton_scope);

        let args = match self.config.request_timeout {
            Some(timeout) => tokio::time::timeout(timeout, resolve_fut)
                .await
                .map_err(|_| Envelope::timeout().with_request_id(request_id))??,
            None => resolve_fut.await?,
        };

        Ok((args, request_scope))
    }

    /// Runs every queued singleton-scoped resource release. Intended to be called
    /// once, as the server process shuts down.
    pub async fn shutdown(&self) {
        self.singleton_scope.close().await;
    }
}

fn graph_error_to_envelope(err: GraphError, request_id: uuid::Uuid) -> Envelope {
    Envelope::internal(anyhow::anyhow!(err.to_string())).with_request_id(request_id)
}
