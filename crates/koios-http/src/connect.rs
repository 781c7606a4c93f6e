//! Connector layer that stamps connection establishment on the active
//! stats collector.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use koios_core::stats::{mark_current, Phase};
use tower::{Layer, Service};

/// Wraps reqwest's connector. The wrapped connector resolves once the TCP
/// connection is up and, for `https`, after the TLS handshake, so both
/// phases share one stamp. Plain requests ignore the TLS mark.
///
/// Only new connections are timed; a request served from the pool records
/// neither phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectTimingLayer;

impl<S> Layer<S> for ConnectTimingLayer {
    type Service = ConnectTiming<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ConnectTiming { inner }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectTiming<S> {
    inner: S,
}

impl<S, R> Service<R> for ConnectTiming<S>
where
    S: Service<R> + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    R: 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: R) -> Self::Future {
        let connecting = self.inner.call(req);
        Box::pin(async move {
            let conn = connecting.await?;
            mark_current(Phase::Connected);
            mark_current(Phase::TlsHandshakeDone);
            tracing::trace!("connection established");
            Ok(conn)
        })
    }
}
