//! lsp-mux Transport Layer
//!
//! Provides the stdio transport for the multiplexer. The transport layer
//! handles:
//! - The one-time credential bootstrap read before serving begins
//! - Line-delimited JSON-RPC request/notification dispatch
//! - Request cancellation (`$/cancelRequest`)
//! - Containing handler panics so one request cannot take down the rest
//!
//! The transport is decoupled from the router via the `RequestHandler` trait;
//! [`Connection`] is the handler table the router binds itself to.

pub mod bootstrap;
pub mod cancel;
pub mod connection;
pub mod panic;
pub mod server;

use std::future::Future;
use std::pin::Pin;

pub use cancel::CancellationToken;
pub use connection::Connection;
pub use panic::catch_panic;
pub use server::{RequestHandler, serve};

/// A boxed, sendable future, as stored in handler tables.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;
