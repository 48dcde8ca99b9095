//! Container configuration.
//!
//! The teacher crate has no equivalent config struct (its `serve()` takes a bare
//! `TcpListener` and `Router`); this is built fresh for the DI container, following the
//! same "plain struct with sane defaults, no env/CLI loading" shape used across the
//! pack's config types.

use std::time::Duration;

/// Text encoding assumed when coercing a raw request body to a string (§C3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
}

/// Configuration for a [`crate::container::Container`].
///
/// No field here is loaded from the environment or a CLI — that bootstrapping is left
/// to whatever binary embeds this crate.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Upper bound on the number of OS threads used for blocking (sync) providers.
    /// `None` defers to `tokio`'s own blocking pool default.
    pub worker_pool_size: Option<usize>,
    /// Encoding assumed when coercing a body to a string.
    pub default_body_encoding: Encoding,
    /// Per-route resolution deadline. `None` disables the timeout (§5).
    pub request_timeout: Option<Duration>,
    /// Maximum number of bytes accepted for a request body, checked against the
    /// `Content-Length` header before the body is read. `None` disables the limit.
    /// A request over the limit is rejected as `ErrorKind::BadRequest`, the taxonomy
    /// having no dedicated payload-too-large kind (§C7).
    pub max_body_bytes: Option<usize>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: None,
            default_body_encoding: Encoding::Utf8,
            request_timeout: Some(Duration::from_secs(30)),
            max_body_bytes: Some(10 * 1024 * 1024),
        }
    }
}

impl ContainerConfig {
    /// Starts from [`Default`] and lets call sites override a single field at a time.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_body_bytes(mut self, max: Option<usize>) -> Self {
        self.max_body_bytes = max;
        self
    }

    pub fn with_worker_pool_size(mut self, size: Option<usize>) -> Self {
        self.worker_pool_size = size;
        self
    }
}
