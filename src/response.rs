//! Response body composition and streaming.
//!
//! `ResponseBody` plays the role the teacher crate gives `TakoBody`: a single body type
//! that can be backed by a fully-buffered byte slice or by a live stream of chunks, so
//! the dispatcher (§4.6/C6) can hand either a single-shot response or a streamed one to
//! the transport without the handler needing to know which.

use std::{
    fmt::Debug,
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::{Body, Frame, SizeHint};

use crate::types::{BoxBody, BoxError};

/// A response body that is either buffered or produced chunk-by-chunk.
///
/// Streaming bodies never buffer: each chunk is handed to the transport as soon as the
/// producing lazy sequence yields it, per §6's back-pressure note ("the resolver does
/// not buffer").
pub struct ResponseBody(BoxBody);

impl ResponseBody {
    /// Wraps any `http_body::Body` implementation.
    pub fn new<B>(body: B) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self(body.map_err(Into::into).boxed_unsync())
    }

    /// An empty body, used for 204/304 responses and redirects.
    pub fn empty() -> Self {
        Self::new(Empty::new())
    }

    /// Builds a streamed response body from a finite or infinite chunk sequence.
    ///
    /// This is the adapter C6 uses when a handler's return value is a lazy sequence of
    /// chunks (§4.6). Cancellation of the outer response future drops the stream,
    /// which is how the dispatcher observes a client disconnect and stops pulling
    /// further chunks (§5, "Cancellation & timeouts").
    pub fn from_stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError> + Debug + 'static,
    {
        let frames = stream.map_err(Into::into).map_ok(Frame::data);
        Self(StreamBody::new(frames).boxed_unsync())
    }
}

impl Default for ResponseBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<&'static str> for ResponseBody {
    fn from(value: &'static str) -> Self {
        Self::new(Full::from(Bytes::from_static(value.as_bytes())))
    }
}

impl From<String> for ResponseBody {
    fn from(value: String) -> Self {
        Self::new(Full::from(Bytes::from(value)))
    }
}

impl From<Bytes> for ResponseBody {
    fn from(value: Bytes) -> Self {
        Self::new(Full::from(value))
    }
}

impl From<Vec<u8>> for ResponseBody {
    fn from(value: Vec<u8>) -> Self {
        Self::new(Full::from(Bytes::from(value)))
    }
}

impl Body for ResponseBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.get_mut().0).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.0.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.0.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt as _;

    #[tokio::test]
    async fn empty_body_has_no_frames() {
        let body = ResponseBody::empty();
        assert!(body.is_end_stream());
    }

    #[tokio::test]
    async fn buffered_body_roundtrips() {
        let body = ResponseBody::from("hello".to_string());
        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(collected, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn streamed_body_yields_each_chunk() {
        let chunks = vec![
            Ok::<_, BoxError>(Bytes::from_static(b"a")),
            Ok(Bytes::from_static(b"b")),
        ];
        let body = ResponseBody::from_stream(futures_util::stream::iter(chunks));
        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(collected, Bytes::from_static(b"ab"));
    }
}
