//! Route table and method/path matching (C6).
//!
//! Grounded in the teacher's `Router::dispatch` loop (iterate registered routes,
//! first path+method match wins) narrowed to just the matching step — response
//! adaptation and resolver invocation live in `dispatcher.rs`.

use std::{collections::HashMap, sync::Arc};

use http::Method;

use crate::dispatch::route::{Route, RouteKind};
use crate::provider::descriptor::HandlerDescriptor;

/// The outcome of matching a request's method and path against the table.
pub enum Matched<'a> {
    Route {
        route: &'a Route,
        path_params: HashMap<String, String>,
    },
    /// The path matched at least one route, but not for this method.
    MethodNotAllowed,
    /// No route's path pattern matched at all.
    NotFound,
}

/// An ordered table of routes. Order matters only in that the first path match wins
/// when more than one pattern could match the same concrete path.
#[derive(Default)]
pub struct Router {
    routes: Vec<Arc<Route>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route whose HTTP method defaults per [`RouteKind::default_method`].
    pub fn add(&mut self, path: impl Into<String>, kind: RouteKind, handler: HandlerDescriptor) -> Arc<Route> {
        self.add_with_method(path, kind.default_method(), kind, handler)
    }

    pub fn add_with_method(
        &mut self,
        path: impl Into<String>,
        method: Method,
        kind: RouteKind,
        handler: HandlerDescriptor,
    ) -> Arc<Route> {
        let route = Arc::new(Route::new(path, method, kind, handler));
        self.routes.push(route.clone());
        route
    }

    /// Matches `method`/`path` against the table, distinguishing "no path matched"
    /// from "a path matched but not for this method".
    pub fn match_request(&self, method: &Method, path: &str) -> Matched<'_> {
        let mut path_matched_any_method = false;

        for route in &self.routes {
            if let Some(path_params) = route.match_path(path) {
                if &route.method == method {
                    return Matched::Route { route, path_params };
                }
                path_matched_any_method = true;
            }
        }

        if path_matched_any_method {
            Matched::MethodNotAllowed
        } else {
            Matched::NotFound
        }
    }
}
