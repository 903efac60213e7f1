//! Response types and a minimal listener for produced handlers.
//!
//! The listener serves exactly one [`HandlerFn`]; path matching is left to
//! the caller.

mod config;
mod error;
mod handler;
mod http_server;
mod response;
mod writer;

pub use config::ServerConfig;
pub use error::Error;
pub use handler::{handler_fn, HandlerFn, HandlerFuture};
pub use http_server::HttpServer;
pub use response::{HttpResponse, StatusCode};
pub use writer::ResponseWriter;
