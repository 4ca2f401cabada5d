//! Minimal finger client.
//!
//! Sends one query line and collects everything the server writes until it
//! closes the connection.

use bytes::{Bytes, BytesMut};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::trace;

use crate::error::FingerError;
use crate::query::Query;

const BUFFER_SIZE: usize = 4 * 1024;

/// Send `query` to the finger server at `addr` and return its reply.
pub async fn query<A: ToSocketAddrs>(addr: A, query: &Query) -> Result<Bytes, FingerError> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(query.to_line().as_bytes()).await?;

    let mut reply = BytesMut::with_capacity(BUFFER_SIZE);
    loop {
        let n = stream.read_buf(&mut reply).await?;
        if n == 0 {
            break;
        }
    }
    trace!(%query, bytes = reply.len(), "Received reply");

    Ok(reply.freeze())
}

/// Like [`query`], failing with [`FingerError::ReadTimeout`] if the whole
/// exchange takes longer than `timeout`.
pub async fn query_timeout<A: ToSocketAddrs>(
    addr: A,
    q: &Query,
    timeout: Duration,
) -> Result<Bytes, FingerError> {
    tokio::time::timeout(timeout, query(addr, q))
        .await
        .map_err(|_| FingerError::ReadTimeout)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncBufReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_query_sends_line_and_reads_to_eof() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut stream = tokio::io::BufReader::new(stream);
            let mut line = String::new();
            stream.read_line(&mut line).await.unwrap();
            stream.get_mut().write_all(b"line one\r\n").await.unwrap();
            stream.get_mut().write_all(b"line two\r\n").await.unwrap();
            line
        });

        let reply = query(addr, &Query::new("alice").with_hosts(["example"]))
            .await
            .unwrap();
        assert_eq!(&reply[..], b"line one\r\nline two\r\n");
        assert_eq!(server.await.unwrap(), "alice@example\r\n");
    }

    #[tokio::test]
    async fn test_query_timeout_expires() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Accept and hold the connection open without replying
        let _server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let result = query_timeout(addr, &Query::default(), Duration::from_millis(100)).await;
        assert!(matches!(result, Err(FingerError::ReadTimeout)));
    }
}
