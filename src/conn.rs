//! Per-connection transport.
//!
//! A [`Connection`] is anything the server can read a query from and write a
//! reply to. [`DeadlineStream`] arms absolute read and write deadlines on a
//! connection, the way socket deadlines work: once an instant has passed,
//! every further read (or write) fails with `TimedOut`.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::{Instant, Sleep};

/// A bidirectional byte stream the server can serve one query on.
pub trait Connection: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    /// Address of the peer, if the transport has one.
    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

impl Connection for TcpStream {
    fn peer_addr(&self) -> Option<SocketAddr> {
        TcpStream::peer_addr(self).ok()
    }
}

impl Connection for DuplexStream {}

/// Absolute read/write deadlines for one connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadlines {
    pub read: Option<Instant>,
    pub write: Option<Instant>,
}

impl Deadlines {
    /// Compute deadlines from `start`. A zero timeout means no deadline.
    pub fn from_timeouts(start: Instant, read: Duration, write: Duration) -> Self {
        let at = |timeout: Duration| (!timeout.is_zero()).then(|| start + timeout);
        Self {
            read: at(read),
            write: at(write),
        }
    }
}

/// Wraps a connection and fails I/O past its deadlines.
pub struct DeadlineStream<C> {
    inner: C,
    read_timer: Option<Pin<Box<Sleep>>>,
    write_timer: Option<Pin<Box<Sleep>>>,
    write_expired: bool,
}

impl<C: Connection> DeadlineStream<C> {
    pub fn new(inner: C, deadlines: Deadlines) -> Self {
        Self {
            inner,
            read_timer: deadlines.read.map(|at| Box::pin(tokio::time::sleep_until(at))),
            write_timer: deadlines.write.map(|at| Box::pin(tokio::time::sleep_until(at))),
            write_expired: false,
        }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.peer_addr()
    }

    /// True once a write has been refused for passing the write deadline.
    pub fn write_expired(&self) -> bool {
        self.write_expired
    }
}

/// Polls the timer, registering for a wakeup when it is still pending.
fn expired(timer: &mut Option<Pin<Box<Sleep>>>, cx: &mut Context<'_>) -> bool {
    match timer {
        Some(sleep) => sleep.as_mut().poll(cx).is_ready(),
        None => false,
    }
}

fn timed_out<T>() -> Poll<io::Result<T>> {
    Poll::Ready(Err(io::Error::from(io::ErrorKind::TimedOut)))
}

impl<C: Connection> AsyncRead for DeadlineStream<C> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if expired(&mut this.read_timer, cx) {
            return timed_out();
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<C: Connection> AsyncWrite for DeadlineStream<C> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if expired(&mut this.write_timer, cx) {
            this.write_expired = true;
            return timed_out();
        }
        Pin::new(&mut this.inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if expired(&mut this.write_timer, cx) {
            this.write_expired = true;
            return timed_out();
        }
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
