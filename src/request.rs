//! The request model (C1): an immutable-after-construction view built once per
//! connection from the transport's raw `hyper::Request<Incoming>`.
//!
//! Grounded in the teacher's extractor set (`extractors/header_map.rs`,
//! `extractors/cookie_jar.rs`, `extractors/params.rs`, `extractors/query.rs`) which
//! read directly off `hyper::Request`/`Parts` on every call; here those reads are
//! done once at construction (headers, query) or lazily and memoized (cookies), and
//! the body is put behind a guarded slot so it can only be consumed once regardless
//! of how many providers declare a body dependency.

use std::{collections::HashMap, sync::OnceLock};

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use tokio::sync::Mutex;
use url::form_urlencoded;

use crate::{error::Envelope, types::RawRequest};

/// Tracks how far the body has been consumed so repeated access is cheap and
/// "at most once" read from the transport is enforced.
enum BodyState {
    Pending(Incoming),
    Buffered(Bytes),
    /// The body was handed out as a stream; a second consumer can't also have it.
    Taken,
}

/// The immutable view of an in-flight request that providers resolve against.
///
/// Built once per connection by the dispatcher after a route match (path params are
/// bound at that point); every other field is derived directly from the transport
/// request and never mutated afterwards.
pub struct Request {
    method: Method,
    uri: Uri,
    path_params: HashMap<String, String>,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    cookies: OnceLock<HashMap<String, String>>,
    body: Mutex<BodyState>,
    request_id: uuid::Uuid,
}

impl Request {
    /// Builds a view from the raw transport request. `path_params` is supplied by the
    /// router once a route has matched; callers constructing a request ahead of a
    /// route match (tests, for instance) may pass an empty map.
    pub fn new(raw: RawRequest, path_params: HashMap<String, String>) -> Self {
        let (parts, body) = raw.into_parts();
        let query = parts
            .uri
            .query()
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        Self {
            method: parts.method,
            uri: parts.uri,
            path_params,
            query,
            headers: parts.headers,
            cookies: OnceLock::new(),
            body: Mutex::new(BodyState::Pending(body)),
            request_id: uuid::Uuid::new_v4(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn request_id(&self) -> uuid::Uuid {
        self.request_id
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// All values for `name` in declaration order (C2's `headers` source).
    pub fn header_all<'a>(&'a self, name: &str) -> Vec<&'a str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    pub fn query_first(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn query_all<'a>(&'a self, name: &str) -> Vec<&'a str> {
        self.query
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// Parses the `Cookie` header on first access and memoizes the result, matching
    /// the teacher's `CookieJar::from_headers` parsing but cached per-request instead
    /// of re-parsed on every extractor call.
    pub fn cookies(&self) -> &HashMap<String, String> {
        self.cookies.get_or_init(|| {
            let mut jar = HashMap::new();
            if let Some(raw) = self.header("cookie") {
                for part in raw.split(';') {
                    if let Some((name, value)) = part.trim().split_once('=') {
                        jar.insert(name.trim().to_string(), value.trim().to_string());
                    }
                }
            }
            jar
        })
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies().get(name).map(String::as_str)
    }

    /// Reads the whole body into memory, buffering it so a second call returns the
    /// same bytes instead of failing.
    pub async fn body_bytes(&self) -> Result<Bytes, Envelope> {
        let mut guard = self.body.lock().await;
        match &*guard {
            BodyState::Buffered(bytes) => Ok(bytes.clone()),
            BodyState::Taken => Err(Envelope::bad_request(
                "request body was already consumed as a stream",
            )),
            BodyState::Pending(_) => {
                let BodyState::Pending(incoming) = std::mem::replace(&mut *guard, BodyState::Taken)
                else {
                    unreachable!()
                };
                let collected = incoming
                    .collect()
                    .await
                    .map_err(|e| Envelope::bad_request(format!("failed to read body: {e}")))?
                    .to_bytes();
                *guard = BodyState::Buffered(collected.clone());
                Ok(collected)
            }
        }
    }

    /// Takes ownership of the raw body stream for a streaming provider. Can only
    /// succeed once, and only before any call to [`Request::body_bytes`].
    pub async fn take_body_stream(&self) -> Result<Incoming, Envelope> {
        let mut guard = self.body.lock().await;
        match std::mem::replace(&mut *guard, BodyState::Taken) {
            BodyState::Pending(incoming) => Ok(incoming),
            other => {
                *guard = other;
                Err(Envelope::bad_request(
                    "request body was already consumed",
                ))
            }
        }
    }
}

/// Test-only helpers for building a [`Request`] without a live transport connection.
/// Used across this module's and sibling provider modules' unit tests.
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn from_query(query: &str, path_params: HashMap<String, String>) -> Request {
        let uri: Uri = if query.is_empty() {
            "/".parse().unwrap()
        } else {
            format!("/?{query}").parse().unwrap()
        };
        Request {
            method: Method::GET,
            query: uri
                .query()
                .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
                .unwrap_or_default(),
            uri,
            path_params,
            headers: HeaderMap::new(),
            cookies: OnceLock::new(),
            body: Mutex::new(BodyState::Buffered(Bytes::new())),
            request_id: uuid::Uuid::new_v4(),
        }
    }

    /// Builds a request carrying a body and explicit headers, for providers that read
    /// `Content-Type` or other header-driven behavior off a non-`GET` request.
    pub fn with_headers_and_body(headers: HeaderMap, body: Bytes) -> Request {
        Request {
            method: Method::POST,
            uri: "/".parse().unwrap(),
            path_params: HashMap::new(),
            query: Vec::new(),
            headers,
            cookies: OnceLock::new(),
            body: Mutex::new(BodyState::Buffered(body)),
            request_id: uuid::Uuid::new_v4(),
        }
    }
}
