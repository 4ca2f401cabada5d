//! Pluggable response logic.
//!
//! A [`Handler`] is invoked at most once per connection, after a query line
//! has been read and parsed. It writes its reply straight to the connection;
//! the server closes the connection once it returns.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::query::Query;

/// Responds to a finger query.
///
/// Failures are the handler's own concern: nothing is returned, and the
/// server neither retries nor reports them.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn serve_finger(&self, w: &mut (dyn AsyncWrite + Send + Unpin), query: &Query);
}

#[async_trait]
impl<H: Handler> Handler for Arc<H> {
    async fn serve_finger(&self, w: &mut (dyn AsyncWrite + Send + Unpin), query: &Query) {
        (**self).serve_finger(w, query).await
    }
}

/// Adapts a plain function producing the whole reply into a [`Handler`].
///
/// The reply is built in memory before anything is written. Handlers that
/// stream their output, or need to see write errors, implement [`Handler`]
/// directly.
pub struct HandlerFn<F>(pub F);

#[async_trait]
impl<F> Handler for HandlerFn<F>
where
    F: Fn(&Query) -> Bytes + Send + Sync + 'static,
{
    async fn serve_finger(&self, w: &mut (dyn AsyncWrite + Send + Unpin), query: &Query) {
        let reply = (self.0)(query);
        if let Err(e) = w.write_all(&reply).await {
            debug!(error = %e, "Failed to write reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handler_fn_writes_reply() {
        let handler = HandlerFn(|q: &Query| Bytes::from(format!("hello {}\r\n", q.username)));

        let mut out: Vec<u8> = Vec::new();
        handler.serve_finger(&mut out, &Query::new("alice")).await;
        assert_eq!(out, b"hello alice\r\n");
    }

    #[tokio::test]
    async fn test_arc_handler_forwards() {
        let handler = Arc::new(HandlerFn(|_: &Query| Bytes::from_static(b"ok")));

        let mut out: Vec<u8> = Vec::new();
        handler.serve_finger(&mut out, &Query::default()).await;
        assert_eq!(out, b"ok");
    }

    #[tokio::test]
    async fn test_handler_fn_swallows_write_errors() {
        let handler = HandlerFn(|_: &Query| Bytes::from_static(b"lost"));

        let mut sink = tokio_test::io::Builder::new()
            .write_error(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
            .build();
        handler.serve_finger(&mut sink, &Query::default()).await;
    }
}
