//! The binding/dispatch engine.
//!
//! A [`Broker`] wraps a plain function. At construction it classifies each
//! parameter into a [`ParamKind`]. For every request it authenticates, builds
//! the arguments (decoding and validating body parameters), calls the
//! function, and turns the returned [`Reply`] into a response:
//!
//! | Return type            | Success                        | Failure                       |
//! |------------------------|--------------------------------|-------------------------------|
//! | `()`                   | `200`, empty                   |                               |
//! | `Result<(), E>`        | `200`, empty                   | `400 {"code": "<message>"}`   |
//! | [`ReplyValue`]         | `200`, text or JSON body       |                               |
//! | `Result<T, E>`         | `200`, text body only          | `400`, no body                |
//!
//! Authentication failures answer `403 {"code":"UnAuthorized"}`; decode and
//! validation failures answer `400 {"code": "<message>"}`.

mod arguments;
mod config;
mod dispatcher;
mod error;
mod reply;
mod respond;
mod signature;
mod strategy;
mod tests;

pub use arguments::{ArgumentScope, Arguments};
pub use config::BrokerConfig;
pub use dispatcher::Broker;
pub use error::{BoxError, DispatchError, Unauthorized};
pub use reply::{Json, Payload, Reply, ReplyValue, ReturnShape};
pub use respond::ErrorResponder;
pub use signature::{Param, ParamDescriptor, ParamKind, ParamList, Signature, Wrapped};
pub use strategy::{AcceptAll, AllowAnonymous, Authenticator, Decoder, JsonDecoder, Validator};
