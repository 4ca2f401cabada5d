//! fingerd: an RFC 1288 finger server.
//!
//! A client connects, sends one line naming a user and an optional chain of
//! hosts, and the server writes a plain-text reply before closing the
//! connection. This crate provides:
//! - A lenient query parser that accepts any input line
//! - A concurrent TCP server with per-connection deadlines and a query size cap
//! - A pluggable [`Handler`] that produces the reply
//! - A small client for sending queries
//!
//! ```no_run
//! use bytes::Bytes;
//! use fingerd::{HandlerFn, Query};
//!
//! # async fn run() -> Result<(), fingerd::FingerError> {
//! fingerd::serve(HandlerFn(|q: &Query| {
//!     Bytes::from(format!("no plan for {}\r\n", q.username))
//! }))
//! .await
//! # }
//! ```

pub mod client;
pub mod conn;
pub mod error;
pub mod handler;
pub mod query;
pub mod server;

pub use conn::Connection;
pub use error::FingerError;
pub use handler::{Handler, HandlerFn};
pub use query::{parse, Query};
pub use server::{listen, serve, Server, ServerBuilder};
