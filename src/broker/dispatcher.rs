//! The broker: one wrapped function bound to its strategies.

use std::error::Error as StdError;
use std::marker::PhantomData;
use std::sync::Arc;
use log::{debug, warn};

use crate::broker::arguments::{ArgumentScope, Arguments};
use crate::broker::config::BrokerConfig;
use crate::broker::error::{DispatchError, Unauthorized};
use crate::broker::reply::Reply;
use crate::broker::respond::{write_reply, ErrorResponder};
use crate::broker::signature::{ParamList, Signature, Wrapped};
use crate::broker::strategy::{Authenticator, Decoder, Validator};
use crate::parser::HttpRequest;
use crate::server::{handler_fn, HandlerFn, HttpResponse, ResponseWriter, StatusCode};

/// Adapts a plain function into a request handler.
///
/// The function's signature is analyzed once, in [`Broker::new`]. Each
/// request then goes through [`synthesize`](Self::synthesize),
/// [`invoke`](Self::invoke) and [`respond`](Self::respond), which
/// [`handle`](Self::handle) runs in sequence.
///
/// ```
/// use hwrap_rs::broker::{AcceptAll, AllowAnonymous, Broker, JsonDecoder};
/// use hwrap_rs::{HttpRequest, HttpVersion, Method, StatusCode};
/// use serde::Deserialize;
/// use std::collections::HashMap;
///
/// #[derive(Deserialize)]
/// struct Greeting {
///     name: String,
/// }
///
/// fn greet(greeting: Greeting) -> Result<String, std::io::Error> {
///     Ok(format!("Hello, {}!", greeting.name))
/// }
///
/// let broker = Broker::new(greet, JsonDecoder, AllowAnonymous, AcceptAll);
///
/// let request = HttpRequest::new(Method::POST, "/greet", HttpVersion::Http11, HashMap::new())
///     .with_header("Content-Type", "application/json")
///     .with_body(r#"{"name":"Ada"}"#);
///
/// let response = broker.dispatch(request);
/// assert_eq!(response.status, StatusCode::Ok);
/// assert_eq!(response.body, b"Hello, Ada!");
/// ```
pub struct Broker<F, Args, D, A, V> {
    function: F,
    signature: Signature,
    decoder: D,
    authenticator: A,
    validator: V,
    responder: ErrorResponder,
    config: BrokerConfig,
    _args: PhantomData<fn(Args)>,
}

impl<F, Args, D, A, V> Broker<F, Args, D, A, V>
where
    F: Wrapped<Args>,
    Args: ParamList,
    D: Decoder,
    A: Authenticator,
    V: Validator,
{
    /// Wrap `function` with its decode, authenticate and validate strategies.
    pub fn new(function: F, decoder: D, authenticator: A, validator: V) -> Self {
        let signature = Signature::of::<Args>();
        debug!("Wrapping {name}{signature}", name = std::any::type_name::<F>());

        Self {
            function,
            signature,
            decoder,
            authenticator,
            validator,
            responder: ErrorResponder::default(),
            config: BrokerConfig::default(),
            _args: PhantomData,
        }
    }

    pub fn with_config(mut self, config: BrokerConfig) -> Self {
        self.config = config;
        self
    }

    /// Route errors of type `E` to `status` instead of `400`.
    ///
    /// Applies to errors returned by the function as well as to decode and
    /// validation failures.
    pub fn with_sentinel<E: StdError + 'static>(mut self, status: StatusCode) -> Self {
        self.responder = self.responder.with_sentinel::<E>(status);
        self
    }

    /// The parameter descriptors computed at construction.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn responder(&self) -> &ErrorResponder {
        &self.responder
    }

    /// Authenticate `request` and build the function's arguments.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Unauthorized`] when the authenticator fails, in which
    /// case nothing is decoded. Otherwise the first decode or validation
    /// failure, in declared parameter order.
    pub fn synthesize(&self, request: HttpRequest, writer: &ResponseWriter) -> Result<Arguments<Args>, DispatchError> {
        let request = self.authenticator.authenticate(request).map_err(|cause| {
            warn!("Authentication failed: {cause}");
            Unauthorized
        })?;

        let mut scope = ArgumentScope::new(&request, writer, &self.decoder, &self.validator);
        let values = Args::synthesize(&self.signature, &mut scope)?;
        Ok(Arguments::new(values, scope.into_bound()))
    }

    /// Call the wrapped function.
    pub fn invoke(&self, arguments: Arguments<Args>) -> F::Output {
        self.function.invoke(arguments.into_values())
    }

    /// Write the response for the function's return value.
    pub fn respond(&self, output: F::Output, writer: &ResponseWriter) {
        write_reply(output.into_shape(), writer, &self.responder, &self.config);
    }

    /// Serve one request into `writer`.
    pub fn handle(&self, request: HttpRequest, writer: &ResponseWriter) {
        match self.synthesize(request, writer) {
            Ok(arguments) => {
                let output = self.invoke(arguments);
                self.respond(output, writer);
            }
            Err(e) => self.responder.respond(writer, &e),
        }
    }

    /// Serve one request into a fresh writer and return the response.
    pub fn dispatch(&self, request: HttpRequest) -> HttpResponse {
        let writer = ResponseWriter::new();
        self.handle(request, &writer);
        writer.finish()
    }

    /// Box the broker into a [`HandlerFn`] for [`HttpServer`](crate::server::HttpServer).
    pub fn into_handler(self) -> HandlerFn
    where
        Args: 'static,
    {
        let broker = Arc::new(self);
        handler_fn(move |request| {
            let broker = Arc::clone(&broker);
            async move { Ok(broker.dispatch(request)) }
        })
    }
}
