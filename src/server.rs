//! HTTP server bootstrap.
//!
//! Narrowed from the teacher's `server.rs`: one accept loop, one task per connection,
//! HTTP/1.1 with upgrades. The teacher dispatches straight to a `Router`; here each
//! connection's service closure defers to a [`Dispatcher`], which additionally drives
//! the resolver between matching a route and invoking it.

use std::{convert::Infallible, sync::Arc};

use hyper::{server::conn::http1, service::service_fn};
use tokio::net::TcpListener;

use crate::{dispatch::dispatcher::Dispatcher, types::BoxError};

/// Starts the server on `listener`, dispatching every request through `dispatcher`
/// until the process is terminated or the listener errors.
pub async fn serve(listener: TcpListener, dispatcher: Dispatcher) -> Result<(), BoxError> {
    let dispatcher = Arc::new(dispatcher);
    tracing::info!(addr = %listener.local_addr()?, "skein listening");

    loop {
        let (stream, _addr) = listener.accept().await?;
        let io = hyper_util::rt::TokioIo::new(stream);
        let dispatcher = dispatcher.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let dispatcher = dispatcher.clone();
                async move { Ok::<_, Infallible>(dispatcher.dispatch(req).await) }
            });

            let mut http = http1::Builder::new();
            http.keep_alive(true);
            let conn = http.serve_connection(io, svc).with_upgrades();

            if let Err(err) = conn.await {
                tracing::warn!(%err, "connection error");
            }
        });
    }
}
