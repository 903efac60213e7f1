//! The pluggable strategies a [`Broker`](crate::broker::Broker) is built with.
//!
//! Decoding, authentication and validation are supplied by the caller. The
//! types here define their interface and provide simple defaults.

use std::any::Any;
use serde::de::DeserializeOwned;

use crate::broker::error::BoxError;
use crate::parser::HttpRequest;

/// Produces body parameters from the inbound request.
///
/// `decode` is called once per body parameter per request, and the value it
/// returns is owned by that request alone.
pub trait Decoder: Send + Sync + 'static {
    /// Decode a fresh `T` from `request`.
    fn decode<T: DeserializeOwned>(&self, request: &HttpRequest) -> Result<T, BoxError>;
}

/// Admits or rejects a request before any argument is built.
///
/// The returned request replaces the inbound one for the rest of the
/// dispatch, so an implementation may attach context values to it.
pub trait Authenticator: Send + Sync + 'static {
    fn authenticate(&self, request: HttpRequest) -> Result<HttpRequest, BoxError>;
}

impl<F> Authenticator for F
where
    F: Fn(HttpRequest) -> Result<HttpRequest, BoxError> + Send + Sync + 'static,
{
    fn authenticate(&self, request: HttpRequest) -> Result<HttpRequest, BoxError> {
        self(request)
    }
}

/// Checks every decoded body parameter before the wrapped function runs.
///
/// The value is handed over as `&dyn Any` with its declared parameter type;
/// implementations downcast to the types they know and accept the rest.
pub trait Validator: Send + Sync + 'static {
    fn validate(&self, value: &dyn Any) -> Result<(), BoxError>;
}

impl<F> Validator for F
where
    F: Fn(&dyn Any) -> Result<(), BoxError> + Send + Sync + 'static,
{
    fn validate(&self, value: &dyn Any) -> Result<(), BoxError> {
        self(value)
    }
}

/// Decodes the request body as JSON.
///
/// Requires a `Content-Type: application/json` header.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn decode<T: DeserializeOwned>(&self, request: &HttpRequest) -> Result<T, BoxError> {
        Ok(request.json()?)
    }
}

/// Admits every request unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAnonymous;

impl Authenticator for AllowAnonymous {
    fn authenticate(&self, request: HttpRequest) -> Result<HttpRequest, BoxError> {
        Ok(request)
    }
}

/// Accepts every value.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Validator for AcceptAll {
    fn validate(&self, _value: &dyn Any) -> Result<(), BoxError> {
        Ok(())
    }
}
