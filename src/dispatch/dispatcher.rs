//! Ties the router, resolver, and response adaptation together (C6).
//!
//! Grounded in the teacher's `Router::dispatch` (match → run the endpoint → produce
//! a `Response`), generalized with a resolver step in between and a third outcome —
//! detached commands, whose response is flushed before the handler finishes — that
//! the teacher has no equivalent of.

use std::sync::Arc;

use futures_util::FutureExt;
use http::StatusCode;

use crate::{
    container::Container,
    dispatch::{
        route::{Route, RouteKind},
        router::{Matched, Router},
    },
    error::Envelope,
    failure::FailureReporter,
    provider::descriptor::{HandlerDescriptor, ResolvedArgs},
    request::Request,
    response::ResponseBody,
    types::{RawRequest, Response},
};

/// Dispatches incoming requests against a fixed [`Router`] through a shared
/// [`Container`].
pub struct Dispatcher {
    container: Arc<Container>,
    router: Router,
}

impl Dispatcher {
    pub fn new(container: Arc<Container>, router: Router) -> Self {
        Self { container, router }
    }

    /// Matches, resolves, and invokes a handler for one transport-level request.
    pub async fn dispatch(&self, raw: RawRequest) -> Response {
        let method = raw.method().clone();
        let path = raw.uri().path().to_string();

        let (route, path_params) = match self.router.match_request(&method, &path) {
            Matched::Route { route, path_params } => (route, path_params),
            Matched::MethodNotAllowed => return Envelope::method_not_allowed().into_response(),
            Matched::NotFound => return Envelope::not_found().into_response(),
        };

        if let Some(max) = self.container.config().max_body_bytes {
            if content_length_exceeds(&raw, max) {
                return Envelope::bad_request("request body exceeds the configured size limit").into_response();
            }
        }

        let request = Arc::new(Request::new(raw, path_params));
        self.run_route(route, request).await
    }

    /// Resolves `route`'s parameters against `request` and invokes its handler,
    /// adapting the result per [`RouteKind`]. Split out from [`Dispatcher::dispatch`]
    /// so it can be exercised directly against a hand-built [`Request`], without a
    /// live transport connection to source the raw body from.
    async fn run_route(&self, route: &Route, request: Arc<Request>) -> Response {
        let request_id = request.request_id();

        let (args, request_scope) = match self.container.resolve(&route.handler, request).await {
            Ok(pair) => pair,
            Err(envelope) => {
                self.report_if_server_error(&envelope);
                return envelope.into_response();
            }
        };

        match route.kind {
            RouteKind::Query | RouteKind::Command => {
                let response = run_handler(&route.handler, args, request_id).await;
                request_scope.close().await;
                response
            }
            RouteKind::DetachedCommand => {
                let handler = route.handler.clone();
                let reporter = self.container.failure_reporter().clone();
                tokio::spawn(async move {
                    let response = run_handler(&handler, args, request_id).await;
                    if response.status().is_server_error() {
                        reporter.report(
                            &Envelope::internal(anyhow::anyhow!("detached command handler failed"))
                                .with_request_id(request_id),
                        );
                    }
                    request_scope.close().await;
                });

                let mut response = http::Response::new(ResponseBody::empty());
                *response.status_mut() = StatusCode::ACCEPTED;
                response
            }
        }
    }

    fn report_if_server_error(&self, envelope: &Envelope) {
        if envelope.kind.status().is_server_error() {
            self.container.failure_reporter().report(envelope);
        }
    }
}

/// Invokes the resolved handler, catching a panic and mapping it to an internal
/// error response rather than letting it take down the connection task (§7,
/// "Handler exceptions are captured, mapped to INTERNAL").
async fn run_handler(handler: &HandlerDescriptor, args: ResolvedArgs, request_id: uuid::Uuid) -> Response {
    let invoke = handler.invoke.clone();
    match std::panic::AssertUnwindSafe(invoke(args)).catch_unwind().await {
        Ok(response) => response,
        Err(_) => Envelope::internal(anyhow::anyhow!("handler panicked"))
            .with_request_id(request_id)
            .into_response(),
    }
}

fn content_length_exceeds(raw: &RawRequest, max: usize) -> bool {
    raw.headers()
        .get(http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .is_some_and(|len| len > max)
}
