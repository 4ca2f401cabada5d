//! Error types for the finger server and client.

use std::io;
use thiserror::Error;

/// Errors surfaced by the server, a single connection, or the client.
#[derive(Debug, Error)]
pub enum FingerError {
    /// The listening address could not be acquired.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The accept loop failed and stopped serving.
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    /// No complete query line arrived before the read deadline.
    #[error("read deadline exceeded")]
    ReadTimeout,

    /// The response could not be written before the write deadline.
    #[error("write deadline exceeded")]
    WriteTimeout,

    /// The byte cap was reached before a newline.
    #[error("query exceeds {limit} bytes")]
    QueryTooLong { limit: usize },

    /// Any other I/O failure on a connection.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl FingerError {
    /// True for errors that only affect one connection.
    pub fn is_per_connection(&self) -> bool {
        !matches!(self, FingerError::Bind { .. } | FingerError::Accept(_))
    }
}
