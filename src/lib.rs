//! Turn plain functions into HTTP request handlers.
//!
//! Instead of writing the same boilerplate in every endpoint (pull the
//! request context, decode the body, serialize the answer), register a
//! function whose parameters and return type come from a small set of shapes.
//! A [`Broker`] inspects the signature once and, for each request, binds a
//! value to every parameter, calls the function and writes its result.
//!
//! # Parameters
//!
//! - [`RequestContext`]: the request's cancellation/deadline context
//! - [`HttpRequest`]: the request, as returned by the authenticator
//! - [`ResponseWriter`]: the response sink
//! - anything else that is `DeserializeOwned`: decoded by the [`Decoder`](broker::Decoder)
//!
//! # Example
//!
//! ```
//! use std::any::Any;
//! use std::collections::HashMap;
//! use hwrap_rs::broker::{AllowAnonymous, BoxError, Broker, Json, JsonDecoder};
//! use hwrap_rs::{HttpRequest, HttpVersion, Method, RequestContext, StatusCode};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize)]
//! struct NewUser {
//!     name: String,
//! }
//!
//! #[derive(Serialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! fn create_user(_ctx: RequestContext, user: NewUser) -> Json<User> {
//!     Json(User { id: 1, name: user.name })
//! }
//!
//! let not_blank = |value: &dyn Any| -> Result<(), BoxError> {
//!     match value.downcast_ref::<NewUser>() {
//!         Some(user) if user.name.trim().is_empty() => Err("name is required".into()),
//!         _ => Ok(()),
//!     }
//! };
//!
//! let broker = Broker::new(create_user, JsonDecoder, AllowAnonymous, not_blank);
//!
//! let request = HttpRequest::new(Method::POST, "/users", HttpVersion::Http11, HashMap::new())
//!     .with_header("Content-Type", "application/json")
//!     .with_body(r#"{"name":"Ada"}"#);
//! let response = broker.dispatch(request);
//! assert_eq!(response.status, StatusCode::Ok);
//! assert_eq!(response.body_text(), Some(r#"{"id":1,"name":"Ada"}"#));
//!
//! let blank = HttpRequest::new(Method::POST, "/users", HttpVersion::Http11, HashMap::new())
//!     .with_header("Content-Type", "application/json")
//!     .with_body(r#"{"name":" "}"#);
//! let response = broker.dispatch(blank);
//! assert_eq!(response.status, StatusCode::BadRequest);
//! assert_eq!(response.body_text(), Some(r#"{"code":"name is required"}"#));
//! ```
//!
//! To serve it, hand [`Broker::into_handler`] to an [`HttpServer`].

pub mod broker;
pub mod context;
pub mod parser;
pub mod server;

pub use broker::Broker;
pub use context::{CancelHandle, RequestContext};
pub use parser::{Error as ParserError, HttpRequest, HttpVersion, Method, parse_request};
pub use server::{Error as ServerError, HttpResponse, HttpServer, ResponseWriter, ServerConfig, StatusCode};
