//! Route definitions and path pattern matching (C6).
//!
//! Grounded in the teacher's `route.rs` (`Route { path, method, handler, .. }`,
//! `{name}` path-variable syntax) generalized from a single handler slot to a
//! [`HandlerDescriptor`] plus a [`RouteKind`] partition, since this crate dispatches
//! through the resolver rather than straight to a handler function.

use http::Method;

use crate::provider::descriptor::HandlerDescriptor;

/// How a route's handler is invoked once its arguments resolve.
///
/// Read-only, state-changing, and fire-and-forget routes get distinct default HTTP
/// methods, matching the three registration shapes this crate's model draws on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Read-only; handled synchronously, response reflects the return value.
    Query,
    /// State-changing; handled synchronously, response reflects the return value.
    Command,
    /// State-changing; the response is flushed immediately and the handler continues
    /// in a background task whose lifetime is bound to the process, not the request.
    DetachedCommand,
}

impl RouteKind {
    /// The HTTP method a route of this kind uses when none is given explicitly.
    pub fn default_method(self) -> Method {
        match self {
            RouteKind::Query => Method::GET,
            RouteKind::Command | RouteKind::DetachedCommand => Method::POST,
        }
    }
}

/// A single path segment, either a literal or a named capture (`{name}`).
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Capture(String),
}

fn parse_segments(path: &str) -> Vec<Segment> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => Segment::Capture(name.to_string()),
            None => Segment::Literal(s.to_string()),
        })
        .collect()
}

/// A registered route: path pattern, method, kind, and the resolver-facing handler
/// descriptor bound to it.
pub struct Route {
    pub path: String,
    pub method: Method,
    pub kind: RouteKind,
    pub handler: HandlerDescriptor,
    segments: Vec<Segment>,
}

impl Route {
    pub fn new(path: impl Into<String>, method: Method, kind: RouteKind, handler: HandlerDescriptor) -> Self {
        let path = path.into();
        let segments = parse_segments(&path);
        Self {
            path,
            method,
            kind,
            handler,
            segments,
        }
    }

    /// Matches `path` against this route's pattern, returning bound path parameters
    /// on success. Doesn't consider the HTTP method — callers check that separately
    /// to distinguish a 404 (no path matches) from a 405 (path matches, method
    /// doesn't).
    pub fn match_path(&self, path: &str) -> Option<std::collections::HashMap<String, String>> {
        let candidate = parse_segments(path);
        if candidate.len() != self.segments.len() {
            return None;
        }

        let mut params = std::collections::HashMap::new();
        for (expected, actual) in self.segments.iter().zip(candidate.iter()) {
            match expected {
                Segment::Literal(lit) => {
                    let Segment::Literal(actual_lit) = actual else {
                        return None;
                    };
                    if lit != actual_lit {
                        return None;
                    }
                }
                Segment::Capture(name) => {
                    let value = match actual {
                        Segment::Literal(v) => v.clone(),
                        Segment::Capture(v) => v.clone(),
                    };
                    params.insert(name.clone(), value);
                }
            }
        }
        Some(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn noop_descriptor() -> HandlerDescriptor {
        HandlerDescriptor {
            id: crate::provider::descriptor::HandlerId(0),
            params: Vec::new(),
            invoke: Arc::new(|_args| Box::pin(async { unreachable!() })),
        }
    }

    #[test]
    fn literal_path_matches_exactly() {
        let route = Route::new("/health", Method::GET, RouteKind::Query, noop_descriptor());
        assert!(route.match_path("/health").is_some());
        assert!(route.match_path("/health/").is_none());
        assert!(route.match_path("/other").is_none());
    }

    #[test]
    fn captures_bind_path_params() {
        let route = Route::new("/users/{id}/posts/{post_id}", Method::GET, RouteKind::Query, noop_descriptor());
        let params = route.match_path("/users/42/posts/7").unwrap();
        assert_eq!(params.get("id"), Some(&"42".to_string()));
        assert_eq!(params.get("post_id"), Some(&"7".to_string()));
    }

    #[test]
    fn segment_count_mismatch_does_not_match() {
        let route = Route::new("/users/{id}", Method::GET, RouteKind::Query, noop_descriptor());
        assert!(route.match_path("/users/42/extra").is_none());
        assert!(route.match_path("/users").is_none());
    }

    #[test]
    fn default_methods_match_route_kind() {
        assert_eq!(RouteKind::Query.default_method(), Method::GET);
        assert_eq!(RouteKind::Command.default_method(), Method::POST);
        assert_eq!(RouteKind::DetachedCommand.default_method(), Method::POST);
    }
}
