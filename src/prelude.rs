//! Convenience re-exports for embedding this crate's container in a binary.

pub use crate::{
    config::ContainerConfig,
    container::Container,
    dispatch::{
        dispatcher::Dispatcher,
        route::RouteKind,
        router::Router,
    },
    error::{ErrorKind, Envelope},
    provider::{
        descriptor::{HandlerDescriptor, HandlerId, ParamDecl, ResolvedArgs},
        resolver::Lazy,
        spec::{ProviderId, ProviderSpec, Scope, SourceTag},
    },
    request::Request,
    response::ResponseBody,
};
