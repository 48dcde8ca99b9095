//! The closed error taxonomy (C7) and its HTTP status mapping.
//!
//! Mirrors the shape of the teacher's `Responder for anyhow::Error` (a single,
//! coarse-grained conversion to a response) but keyed off a closed enum instead of a
//! single fixed status, since the resolver needs to distinguish several failure shapes
//! (bad input vs. missing route vs. internal failure vs. timeout).

use std::{fmt, sync::Arc};

use http::StatusCode;

use crate::{response::ResponseBody, types::Response};

/// The failure categories the resolver and dispatcher can produce.
///
/// Closed deliberately: anything that doesn't fit one of these variants is an
/// unexpected/internal failure and belongs in [`ErrorKind::Internal`], carrying the
/// underlying `anyhow::Error` for logging (never for the response body, which stays
/// generic — see [`Envelope::into_response`]).
#[derive(Debug, Clone)]
pub enum ErrorKind {
    /// Malformed input the caller can fix: bad query string, bad JSON syntax, a
    /// coercion failure (§C3).
    BadRequest,
    /// Well-formed input that fails semantic validation.
    Validation,
    /// A body was presented with a Content-Type the target extractor doesn't accept.
    UnsupportedMediaType,
    /// No route matched the request path.
    NotFound,
    /// The path matched but not for this HTTP method.
    MethodNotAllowed,
    /// Anything unexpected: a provider panicked, a dependency cycle slipped past
    /// registration-time detection, an I/O failure reading the body. Wrapped in an
    /// `Arc` (rather than a bare `anyhow::Error`, which isn't `Clone`) so an
    /// `Envelope` can be cached and replayed to concurrent callers by the resolver's
    /// scope caches without re-running the failing provider.
    Internal(Arc<anyhow::Error>),
    /// A per-route deadline (§5, `ContainerConfig::request_timeout`) elapsed before
    /// resolution completed.
    Timeout,
}

impl ErrorKind {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorKind::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::BadRequest => write!(f, "bad request"),
            ErrorKind::Validation => write!(f, "validation failed"),
            ErrorKind::UnsupportedMediaType => write!(f, "unsupported media type"),
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::MethodNotAllowed => write!(f, "method not allowed"),
            ErrorKind::Internal(err) => write!(f, "internal error: {err}"),
            ErrorKind::Timeout => write!(f, "resolution timed out"),
        }
    }
}

/// A failure carrying enough context to both log in full and answer the client with a
/// safe, generic body.
///
/// 5xx bodies never leak `message`/`kind` detail to the client (matching
/// `original_source`'s `GuardianMiddleware`, which returns a fixed generic body on
/// unhandled exceptions) — only the request id goes out, for correlation with
/// whatever the [`crate::failure::FailureReporter`] logged.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub kind: ErrorKind,
    pub message: String,
    pub request_id: Option<uuid::Uuid>,
}

impl Envelope {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            request_id: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedMediaType, message)
    }

    pub fn not_found() -> Self {
        Self::new(ErrorKind::NotFound, "no route matched this path")
    }

    pub fn method_not_allowed() -> Self {
        Self::new(ErrorKind::MethodNotAllowed, "method not allowed for this path")
    }

    pub fn internal(err: anyhow::Error) -> Self {
        let message = err.to_string();
        Self::new(ErrorKind::Internal(Arc::new(err)), message)
    }

    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout, "resolution deadline exceeded")
    }

    /// Attaches the request id assigned at [`crate::request::Request`] construction,
    /// so a 5xx response can carry a correlation id without leaking `message`.
    pub fn with_request_id(mut self, id: uuid::Uuid) -> Self {
        self.request_id = Some(id);
        self
    }

    /// Converts the envelope into the HTTP response sent to the client.
    ///
    /// 4xx responses echo `message` (it's caller-actionable); 5xx responses are
    /// generic, matching `GuardianMiddleware`'s fixed body for unhandled exceptions.
    pub fn into_response(self) -> Response {
        let status = self.kind.status();
        let body = if status.is_server_error() {
            match self.request_id {
                Some(id) => format!("Internal Server Error (request-id: {id})"),
                None => "Internal Server Error".to_string(),
            }
        } else {
            self.message
        };

        let mut response = http::Response::new(ResponseBody::from(body));
        *response.status_mut() = status;
        response
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Envelope {}

impl From<anyhow::Error> for Envelope {
    fn from(err: anyhow::Error) -> Self {
        Envelope::internal(err)
    }
}
