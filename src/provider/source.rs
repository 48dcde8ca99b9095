//! Parameter-source providers (C2): the built-in providers that read directly off the
//! request instead of a user-registered function.
//!
//! Each source is a free function returning a [`SourceFn`] closure, grounded in the
//! teacher's per-extractor modules (`header_map.rs`, `cookie_jar.rs`, `query.rs`,
//! `params.rs`, `json.rs`) — one module per concern there, one function per concern
//! here, since there's no `FromRequest` trait to hang an impl off of: the DI graph
//! builder needs a value it can store in a `ProviderNode`, not a trait impl.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::{
    coerce::{self, CoercionError},
    error::Envelope,
    request::Request,
    types::AnyValue,
};

/// Signature every parameter-source provider is boxed into.
pub type SourceFn = Arc<dyn Fn(Arc<Request>) -> BoxFuture<'static, Result<AnyValue, Envelope>> + Send + Sync>;

/// Scalar types a raw string value can be coerced into (§C3). Implemented for the
/// primitives the value-coercion table names; anything else goes through
/// `json_body` instead.
pub trait ScalarCoerce: Send + Sync + Sized + 'static {
    fn coerce(raw: &str) -> Result<Self, CoercionError>;
}

impl ScalarCoerce for String {
    fn coerce(raw: &str) -> Result<Self, CoercionError> {
        Ok(raw.to_string())
    }
}

impl ScalarCoerce for i64 {
    fn coerce(raw: &str) -> Result<Self, CoercionError> {
        coerce::to_i64(raw)
    }
}

impl ScalarCoerce for f64 {
    fn coerce(raw: &str) -> Result<Self, CoercionError> {
        coerce::to_f64(raw)
    }
}

impl ScalarCoerce for bool {
    fn coerce(raw: &str) -> Result<Self, CoercionError> {
        coerce::to_bool(raw)
    }
}

/// Builds the canonical `MISSING_*` message (§4.2/§4.3): "Missing required
/// {source_noun} '{name}'", a 400 since nothing coerced yet.
fn missing(source_noun: &str, name: &str) -> Envelope {
    Envelope::bad_request(format!("Missing required {source_noun} '{name}'"))
}

/// Builds the canonical `INVALID_*` message (§4.2/§4.3): "Invalid {source_noun}
/// '{name}': {err}", a 422 since the value was present but failed coercion. The
/// resolver never sees a bare [`CoercionError`] — every parameter-source provider
/// wraps it with its own name and source tag here before it becomes an [`Envelope`].
fn invalid(source_noun: &str, name: &str, err: CoercionError) -> Envelope {
    Envelope::validation(format!("Invalid {source_noun} '{name}': {err}"))
}

/// A single header value, coerced to `T`. 400s if the header is absent, 422s if it
/// fails to coerce (matches the teacher's `HeaderMap` extractor being infallible only
/// because it hands back the raw map; coercion here is this crate's own addition).
pub fn header<T: ScalarCoerce>(name: String) -> SourceFn {
    Arc::new(move |req| {
        let name = name.clone();
        Box::pin(async move {
            let raw = req
                .header(&name)
                .ok_or_else(|| missing("header", &name))?;
            let value = T::coerce(raw).map_err(|e| invalid("header", &name, e))?;
            Ok(Arc::new(value) as AnyValue)
        })
    })
}

/// An optional single header value; `None` when absent instead of a 400.
pub fn header_optional<T: ScalarCoerce>(name: String) -> SourceFn {
    Arc::new(move |req| {
        let name = name.clone();
        Box::pin(async move {
            let value = match req.header(&name) {
                Some(raw) => Some(T::coerce(raw).map_err(|e| invalid("header", &name, e))?),
                None => None,
            };
            Ok(Arc::new(value) as AnyValue)
        })
    })
}

/// All values for a repeated header, coerced element-wise.
pub fn headers<T: ScalarCoerce>(name: String) -> SourceFn {
    Arc::new(move |req| {
        let name = name.clone();
        Box::pin(async move {
            let values: Vec<String> = req.header_all(&name).into_iter().map(str::to_string).collect();
            let coerced = coerce::to_list(&values, T::coerce).map_err(|e| invalid("header", &name, e))?;
            Ok(Arc::new(coerced) as AnyValue)
        })
    })
}

pub fn cookie<T: ScalarCoerce>(name: String) -> SourceFn {
    Arc::new(move |req| {
        let name = name.clone();
        Box::pin(async move {
            let raw = req
                .cookie(&name)
                .ok_or_else(|| missing("cookie", &name))?;
            let value = T::coerce(raw).map_err(|e| invalid("cookie", &name, e))?;
            Ok(Arc::new(value) as AnyValue)
        })
    })
}

pub fn cookie_optional<T: ScalarCoerce>(name: String) -> SourceFn {
    Arc::new(move |req| {
        let name = name.clone();
        Box::pin(async move {
            let value = match req.cookie(&name) {
                Some(raw) => Some(T::coerce(raw).map_err(|e| invalid("cookie", &name, e))?),
                None => None,
            };
            Ok(Arc::new(value) as AnyValue)
        })
    })
}

pub fn query_param<T: ScalarCoerce>(name: String) -> SourceFn {
    Arc::new(move |req| {
        let name = name.clone();
        Box::pin(async move {
            let raw = req
                .query_first(&name)
                .ok_or_else(|| missing("query parameter", &name))?;
            let value = T::coerce(raw).map_err(|e| invalid("query parameter", &name, e))?;
            Ok(Arc::new(value) as AnyValue)
        })
    })
}

pub fn query_param_optional<T: ScalarCoerce>(name: String) -> SourceFn {
    Arc::new(move |req| {
        let name = name.clone();
        Box::pin(async move {
            let value = match req.query_first(&name) {
                Some(raw) => Some(T::coerce(raw).map_err(|e| invalid("query parameter", &name, e))?),
                None => None,
            };
            Ok(Arc::new(value) as AnyValue)
        })
    })
}

/// All values for a repeated query parameter (`?tag=a&tag=b`), coerced element-wise.
pub fn query_params<T: ScalarCoerce>(name: String) -> SourceFn {
    Arc::new(move |req| {
        let name = name.clone();
        Box::pin(async move {
            let values: Vec<String> = req.query_all(&name).into_iter().map(str::to_string).collect();
            let coerced = coerce::to_list(&values, T::coerce).map_err(|e| invalid("query parameter", &name, e))?;
            Ok(Arc::new(coerced) as AnyValue)
        })
    })
}

pub fn path_param<T: ScalarCoerce>(name: String) -> SourceFn {
    Arc::new(move |req| {
        let name = name.clone();
        Box::pin(async move {
            // A genuinely missing path param means the router never matched this
            // route at all (§4.2); this branch only guards against a capture the
            // router declared but didn't bind, which would be a router bug.
            let raw = req
                .path_param(&name)
                .ok_or_else(|| missing("path parameter", &name))?;
            let value = T::coerce(raw).map_err(|e| invalid("path parameter", &name, e))?;
            Ok(Arc::new(value) as AnyValue)
        })
    })
}

/// The raw, undecoded request body.
pub fn raw_body() -> SourceFn {
    Arc::new(|req| Box::pin(async move { req.body_bytes().await.map(|b| Arc::new(b) as AnyValue) }))
}

/// The body decoded to text under the container's configured encoding.
pub fn body(encoding: crate::config::Encoding) -> SourceFn {
    Arc::new(move |req| {
        Box::pin(async move {
            let bytes = req.body_bytes().await?;
            let text = coerce::bytes_to_string(&bytes, encoding)
                .map_err(|e| Envelope::validation(format!("Invalid body: {e}")))?;
            Ok(Arc::new(text) as AnyValue)
        })
    })
}

/// Checks the request's `Content-Type` against the JSON media types (`application/json`
/// and `application/*+json` suffixed variants), mirroring the teacher's
/// `is_json_content_type`.
fn is_json_content_type(req: &Request) -> bool {
    req.header(http::header::CONTENT_TYPE.as_str())
        .and_then(|ct| ct.parse::<mime_guess::Mime>().ok())
        .map(|mime| mime.type_() == "application" && (mime.subtype() == "json" || mime.suffix().is_some_and(|s| s == "json")))
        .unwrap_or(false)
}

/// The body parsed as JSON into `T` (mirrors the teacher's `Json<T>` extractor,
/// including its Content-Type gate: a structured body sent with a non-JSON
/// Content-Type is rejected with `415` before the bytes are even parsed).
pub fn json_body<T>() -> SourceFn
where
    T: serde::de::DeserializeOwned + Send + Sync + 'static,
{
    Arc::new(|req| {
        Box::pin(async move {
            if !is_json_content_type(&req) {
                return Err(Envelope::unsupported_media_type(
                    "Unsupported media type: expected application/json",
                ));
            }
            let bytes = req.body_bytes().await?;
            let value: T = coerce::json_to(&bytes).map_err(|e| Envelope::validation(format!("Invalid body: {e}")))?;
            Ok(Arc::new(value) as AnyValue)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn request_with_query(query: &str) -> Arc<Request> {
        Arc::new(crate::request::test_support::from_query(query, HashMap::new()))
    }

    #[tokio::test]
    async fn query_param_coerces_to_i64() {
        let req = request_with_query("page=2");
        let provider = query_param::<i64>("page".to_string());
        let value = provider(req).await.unwrap();
        assert_eq!(*value.downcast::<i64>().unwrap(), 2);
    }

    #[tokio::test]
    async fn missing_query_param_is_bad_request() {
        let req = request_with_query("page=2");
        let provider = query_param::<i64>("missing".to_string());
        let err = provider(req).await.unwrap_err();
        assert_eq!(err.kind.status(), http::StatusCode::BAD_REQUEST);
    }

    /// §8 scenario 1: a missing query parameter names itself in the 400 body.
    #[tokio::test]
    async fn missing_query_param_names_itself_in_message() {
        let req = request_with_query("");
        let provider = query_param::<i64>("q".to_string());
        let err = provider(req).await.unwrap_err();
        assert_eq!(err.kind.status(), http::StatusCode::BAD_REQUEST);
        assert!(err.message.contains("Missing required query parameter 'q'"), "{}", err.message);
    }

    /// §8 scenario 2: a query parameter that fails coercion is a 422, naming itself.
    #[tokio::test]
    async fn invalid_query_param_is_validation_error() {
        let req = request_with_query("q=not-an-int");
        let provider = query_param::<i64>("q".to_string());
        let err = provider(req).await.unwrap_err();
        assert_eq!(err.kind.status(), http::StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.message.contains("Invalid query parameter 'q'"), "{}", err.message);
    }

    #[tokio::test]
    async fn query_params_collects_repeated_values() {
        let req = request_with_query("tag=a&tag=b");
        let provider = query_params::<String>("tag".to_string());
        let value = provider(req).await.unwrap();
        let values = value.downcast::<Vec<String>>().unwrap();
        assert_eq!(*values, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn invalid_header_names_itself_in_message() {
        let req = request_with_query("");
        let provider = header::<i64>("x-count".to_string());
        let err = provider(req).await.unwrap_err();
        assert_eq!(err.kind.status(), http::StatusCode::BAD_REQUEST);
        assert!(err.message.contains("Missing required header 'x-count'"), "{}", err.message);
    }

    #[derive(serde::Deserialize)]
    struct Point {
        #[allow(dead_code)]
        x: i32,
    }

    /// §8 scenario 10: a structured body sent under a non-JSON Content-Type is
    /// rejected with 415 before the bytes are even parsed.
    #[tokio::test]
    async fn json_body_rejects_non_json_content_type() {
        let mut headers = http::HeaderMap::new();
        headers.insert(http::header::CONTENT_TYPE, "text/plain".parse().unwrap());
        let req = Arc::new(crate::request::test_support::with_headers_and_body(
            headers,
            bytes::Bytes::from_static(b"{\"x\":1}"),
        ));

        let provider = json_body::<Point>();
        let err = provider(req).await.unwrap_err();
        assert_eq!(err.kind.status(), http::StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(err.message.contains("Unsupported media type"), "{}", err.message);
    }

    #[tokio::test]
    async fn json_body_accepts_json_suffixed_content_type() {
        let mut headers = http::HeaderMap::new();
        headers.insert(http::header::CONTENT_TYPE, "application/hal+json".parse().unwrap());
        let req = Arc::new(crate::request::test_support::with_headers_and_body(
            headers,
            bytes::Bytes::from_static(b"{\"x\":1}"),
        ));

        let provider = json_body::<Point>();
        let value = provider(req).await.unwrap();
        assert_eq!(value.downcast::<Point>().unwrap().x, 1);
    }
}
