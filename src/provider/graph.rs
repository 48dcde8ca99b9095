//! Provider graph construction (C4): turning a handler's declared parameters into a
//! DAG of [`ProviderNode`]s the resolver can walk.
//!
//! A node is either a parameter-source leaf (C2) or a user provider with its own
//! dependencies, recursively expanded. The graph is built once per handler and
//! cached — keyed by `(HandlerId, MockMapId)` exactly as the data model specifies,
//! so an unmocked dispatch pays the construction cost exactly once, and a mocked test
//! run gets its own cached graph per distinct mock set.

use std::{collections::HashMap, sync::Arc};

use dashmap::DashMap;

use crate::provider::{
    descriptor::{HandlerDescriptor, HandlerId, ParamDecl, ProviderFn, ProviderRegistration},
    mock::MockMapId,
    source::SourceFn,
    spec::{ProviderKind, ProviderSpec, Scope},
};

/// A single node in the dependency graph.
pub enum ProviderNode {
    /// A parameter-source leaf: no dependencies of its own.
    Source { scope: Scope, function: SourceFn },
    /// A user-registered provider with its own declared dependencies.
    User {
        scope: Scope,
        dependencies: Vec<ParamDecl>,
        function: ProviderFn,
        blocking: bool,
        release: Option<crate::provider::resource::ReleaseExtractFn>,
    },
}

impl ProviderNode {
    pub fn scope(&self) -> Scope {
        match self {
            ProviderNode::Source { scope, .. } => *scope,
            ProviderNode::User { scope, .. } => *scope,
        }
    }
}

/// The DAG for a single handler (or a single provider's own subgraph, inlined).
pub struct Graph {
    pub nodes: HashMap<ProviderSpec, Arc<ProviderNode>>,
}

/// Registry of everything a [`GraphBuilder`] can resolve a [`ProviderSpec`] into:
/// user providers by id, and parameter sources by spec (each source closure already
/// carries its own concrete target type via the generic it was built with).
#[derive(Default)]
pub struct Registry {
    providers: Vec<ProviderRegistration>,
    sources: HashMap<ProviderSpec, (Scope, SourceFn)>,
}

impl Registry {
    pub fn register_provider(&mut self, registration: ProviderRegistration) -> crate::provider::spec::ProviderId {
        self.providers.push(registration);
        crate::provider::spec::ProviderId(self.providers.len() - 1)
    }

    pub fn register_source(&mut self, spec: ProviderSpec, scope: Scope, function: SourceFn) {
        self.sources.insert(spec, (scope, function));
    }

    fn provider(&self, id: crate::provider::spec::ProviderId) -> &ProviderRegistration {
        &self.providers[id.0]
    }
}

/// Error raised when a handler's declared parameters form a cycle, or name a
/// provider id the registry doesn't know about (both registration-time bugs, never
/// client-facing).
#[derive(Debug)]
pub enum GraphError {
    Cycle(Vec<String>),
    UnknownProvider,
    UnknownSource,
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphError::Cycle(path) => write!(f, "dependency cycle: {}", path.join(" -> ")),
            GraphError::UnknownProvider => write!(f, "unregistered provider id"),
            GraphError::UnknownSource => write!(f, "unregistered parameter source"),
        }
    }
}

impl std::error::Error for GraphError {}

/// Builds and caches [`Graph`]s for handlers, substituting mocked specs in place of
/// their originals when a [`crate::provider::mock::MockMap`] is active.
pub struct GraphBuilder {
    cache: DashMap<(HandlerId, MockMapId), Arc<Graph>>,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds (or returns the cached) graph for `descriptor` under `mocks`.
    pub fn build(
        &self,
        registry: &Registry,
        descriptor: &HandlerDescriptor,
        mocks: &crate::provider::mock::MockMap,
    ) -> Result<Arc<Graph>, GraphError> {
        let key = (descriptor.id, mocks.id());
        if let Some(graph) = self.cache.get(&key) {
            return Ok(graph.clone());
        }

        let mut nodes = HashMap::new();
        let mut stack = Vec::new();
        for param in &descriptor.params {
            let spec = mocks.substitute(&param.spec);
            walk(registry, mocks, &spec, &mut nodes, &mut stack)?;
        }

        let graph = Arc::new(Graph { nodes });
        self.cache.insert(key, graph.clone());
        Ok(graph)
    }
}

fn walk(
    registry: &Registry,
    mocks: &crate::provider::mock::MockMap,
    spec: &ProviderSpec,
    nodes: &mut HashMap<ProviderSpec, Arc<ProviderNode>>,
    stack: &mut Vec<ProviderSpec>,
) -> Result<(), GraphError> {
    if nodes.contains_key(spec) {
        return Ok(());
    }
    if stack.contains(spec) {
        let path = stack.iter().map(describe_spec).collect();
        return Err(GraphError::Cycle(path));
    }

    stack.push(spec.clone());

    let node = match &spec.kind {
        ProviderKind::ParamSource(..) => {
            let (scope, function) = registry
                .sources
                .get(spec)
                .ok_or(GraphError::UnknownSource)?
                .clone();
            ProviderNode::Source { scope, function }
        }
        ProviderKind::UserProvider(id) => {
            let registration = registry.provider(*id);
            for dep in &registration.dependencies {
                let dep_spec = mocks.substitute(&dep.spec);
                walk(registry, mocks, &dep_spec, nodes, stack)?;
            }
            ProviderNode::User {
                scope: registration.scope,
                dependencies: registration.dependencies.clone(),
                function: registration.function.clone(),
                blocking: registration.blocking,
                release: registration.release.clone(),
            }
        }
    };

    stack.pop();
    nodes.insert(spec.clone(), Arc::new(node));
    Ok(())
}

fn describe_spec(spec: &ProviderSpec) -> String {
    match &spec.kind {
        ProviderKind::ParamSource(tag, name) => format!("{tag:?}({name:?})"),
        ProviderKind::UserProvider(id) => format!("provider#{}", id.0),
    }
}
