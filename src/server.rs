//! TCP server for the finger protocol.
//!
//! Accepts connections, reads one bounded query line from each, parses it
//! and hands the connection to the configured [`Handler`].

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{lookup_host, TcpListener};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::conn::{Connection, DeadlineStream, Deadlines};
use crate::error::FingerError;
use crate::handler::Handler;
use crate::query;

/// Address used when none is configured: all IPv4 interfaces, the finger port.
///
/// IPv4 only so the default binds on hosts without IPv6. Configure `[::]:79`
/// for a dual-stack listener.
pub const DEFAULT_ADDR: &str = "0.0.0.0:79";

/// Read/write timeout used by [`serve`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Query size cap used by [`serve`].
pub const DEFAULT_MAX_QUERY_BYTES: usize = 4096;

/// Initial capacity of the query line buffer
const LINE_CAPACITY: usize = 256;

/// Listen backlog
const BACKLOG: i32 = 1024;

/// Finger server.
///
/// The default value is a valid configuration: it binds [`DEFAULT_ADDR`],
/// sets no deadlines, reads unbounded query lines, and closes every
/// connection without a reply since no handler is set.
#[derive(Clone, Default)]
pub struct Server {
    addr: String,
    handler: Option<Arc<dyn Handler>>,
    read_timeout: Duration,
    write_timeout: Duration,
    max_query_bytes: usize,
}

/// Builder for [`Server`].
#[derive(Default)]
pub struct ServerBuilder {
    server: Server,
}

impl ServerBuilder {
    /// Address to bind. Empty means [`DEFAULT_ADDR`].
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.server.addr = addr.into();
        self
    }

    pub fn handler<H: Handler>(mut self, handler: H) -> Self {
        self.server.handler = Some(Arc::new(handler));
        self
    }

    /// Deadline for reading the query, measured from accept. Zero disables it.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.server.read_timeout = timeout;
        self
    }

    /// Deadline for writing the reply, measured from accept. Zero disables it.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.server.write_timeout = timeout;
        self
    }

    /// Most bytes read while looking for the end of the query. Zero disables it.
    pub fn max_query_bytes(mut self, max: usize) -> Self {
        self.server.max_query_bytes = max;
        self
    }

    pub fn build(self) -> Server {
        self.server
    }
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Bind the configured address and serve until the accept loop fails.
    pub async fn listen_and_serve(&self) -> Result<(), FingerError> {
        let listener = listen(&self.addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from `listener`, one task per connection.
    ///
    /// Only an accept failure ends the loop; the listener is closed on return.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), FingerError> {
        self.serve_with_shutdown(listener, std::future::pending())
            .await
    }

    /// Like [`Server::serve`], but returns `Ok(())` once `signal` completes.
    ///
    /// Connections already accepted keep running to completion.
    pub async fn serve_with_shutdown<F>(
        &self,
        listener: TcpListener,
        signal: F,
    ) -> Result<(), FingerError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(signal);

        loop {
            let accepted = tokio::select! {
                _ = &mut signal => {
                    info!("Shutting down finger server");
                    return Ok(());
                }
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    let start = Instant::now();
                    debug!(%peer, "New connection");

                    let server = self.clone();
                    tokio::spawn(async move {
                        match server.serve_connection_from(stream, start).await {
                            Ok(()) => {}
                            Err(e) if e.is_per_connection() => {
                                debug!(%peer, error = %e, "Connection abandoned");
                            }
                            Err(e) => warn!(%peer, error = %e, "Connection failed"),
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    return Err(FingerError::Accept(e));
                }
            }
        }
    }

    /// Serve a single connection, blocking until the reply is complete.
    ///
    /// The connection is closed on every return path. [`FingerError::WriteTimeout`]
    /// means the handler ran but the reply was cut off by the write deadline;
    /// any other error means the query never reached the handler.
    pub async fn serve_connection<C: Connection>(&self, conn: C) -> Result<(), FingerError> {
        self.serve_connection_from(conn, Instant::now()).await
    }

    async fn serve_connection_from<C: Connection>(
        &self,
        conn: C,
        start: Instant,
    ) -> Result<(), FingerError> {
        let deadlines = Deadlines::from_timeouts(start, self.read_timeout, self.write_timeout);
        let mut stream = DeadlineStream::new(conn, deadlines);

        let line = read_query_line(&mut stream, self.max_query_bytes).await?;

        let mut query = query::parse(&String::from_utf8_lossy(&line));
        query.remote_addr = stream.peer_addr();
        trace!(?query, "Parsed query");

        if let Some(handler) = &self.handler {
            handler.serve_finger(&mut stream, &query).await;
        }

        if stream.write_expired() {
            return Err(FingerError::WriteTimeout);
        }

        if let Err(e) = stream.shutdown().await {
            trace!(error = %e, "Shutdown failed");
        }

        Ok(())
    }
}

/// Read up to and including the first newline, reading at most `max` bytes
/// when `max` is positive.
async fn read_query_line<R>(reader: R, max: usize) -> Result<Vec<u8>, FingerError>
where
    R: AsyncRead + Unpin,
{
    let limit = if max > 0 { max as u64 } else { u64::MAX };
    let mut reader = BufReader::new(reader.take(limit));
    let mut line = Vec::with_capacity(LINE_CAPACITY);

    match reader.read_until(b'\n', &mut line).await {
        Ok(_) if line.last() == Some(&b'\n') => Ok(line),
        Ok(n) if max > 0 && n >= max => Err(FingerError::QueryTooLong { limit: max }),
        Ok(_) => Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
        Err(e) if e.kind() == io::ErrorKind::TimedOut => Err(FingerError::ReadTimeout),
        Err(e) => Err(e.into()),
    }
}

/// Resolve and bind `addr` with `SO_REUSEADDR`.
///
/// An empty address means [`DEFAULT_ADDR`]; `":port"` binds all interfaces.
pub async fn listen(addr: &str) -> Result<TcpListener, FingerError> {
    let addr = resolve_addr(addr);
    let bind_error = |source: io::Error| FingerError::Bind {
        addr: addr.clone(),
        source,
    };

    let mut last_error = None;
    for socket_addr in lookup_host(&addr).await.map_err(bind_error)? {
        match bind_socket(socket_addr) {
            Ok(std_listener) => {
                let listener = TcpListener::from_std(std_listener).map_err(bind_error)?;
                info!(address = %socket_addr, "Finger server listening");
                return Ok(listener);
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(bind_error(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::AddrNotAvailable, "address resolved to nothing")
    })))
}

fn resolve_addr(addr: &str) -> String {
    if addr.is_empty() {
        DEFAULT_ADDR.to_string()
    } else if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

fn bind_socket(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    // IPv6 listeners also accept IPv4-mapped peers
    if addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;

    Ok(socket.into())
}

/// Serve `handler` on the finger port with generous timeouts and a 4 KiB
/// query cap.
pub async fn serve<H: Handler>(handler: H) -> Result<(), FingerError> {
    Server::builder()
        .handler(handler)
        .read_timeout(DEFAULT_TIMEOUT)
        .write_timeout(DEFAULT_TIMEOUT)
        .max_query_bytes(DEFAULT_MAX_QUERY_BYTES)
        .build()
        .listen_and_serve()
        .await
}
