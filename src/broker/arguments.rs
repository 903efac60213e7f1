//! Per-request argument synthesis.

use serde::de::DeserializeOwned;
use log::{debug, trace};

use crate::broker::error::DispatchError;
use crate::broker::signature::{Param, ParamDescriptor, ParamKind};
use crate::broker::strategy::{Decoder, Validator};
use crate::context::RequestContext;
use crate::parser::HttpRequest;
use crate::server::ResponseWriter;

/// Everything available while building the arguments of one request.
///
/// A scope lives for a single dispatch. Values it decodes are owned by that
/// dispatch and never shared with another request.
pub struct ArgumentScope<'a, D, V> {
    request: &'a HttpRequest,
    writer: &'a ResponseWriter,
    decoder: &'a D,
    validator: &'a V,
    bound: Vec<ParamKind>,
}

impl<'a, D: Decoder, V: Validator> ArgumentScope<'a, D, V> {
    pub(crate) fn new(request: &'a HttpRequest, writer: &'a ResponseWriter, decoder: &'a D, validator: &'a V) -> Self {
        Self {
            request,
            writer,
            decoder,
            validator,
            bound: Vec::new(),
        }
    }

    /// The authenticated request.
    pub fn request(&self) -> &HttpRequest {
        self.request
    }

    /// The context of the authenticated request.
    pub fn context(&self) -> &RequestContext {
        &self.request.context
    }

    /// The response sink for this request.
    pub fn writer(&self) -> &ResponseWriter {
        self.writer
    }

    /// Decode a fresh `T` and run the validator on it.
    pub fn decode<T: DeserializeOwned + 'static>(&self) -> Result<T, DispatchError> {
        let value: T = self.decoder.decode(self.request).map_err(|e| {
            debug!("Decoding {ty} failed: {e}", ty = std::any::type_name::<T>());
            DispatchError::Decode(e)
        })?;

        self.validator.validate(&value).map_err(|e| {
            debug!("Validation of {ty} failed: {e}", ty = std::any::type_name::<T>());
            DispatchError::Invalid(e)
        })?;

        Ok(value)
    }

    /// Bind the parameter described by `slot`.
    pub(crate) fn bind<P: Param>(&mut self, slot: Option<&ParamDescriptor>) -> Result<P, DispatchError> {
        debug_assert_eq!(slot.map(|s| s.kind), Some(P::KIND));
        if let Some(slot) = slot {
            trace!("Binding parameter {pos} as {kind:?}", pos = slot.position, kind = slot.kind);
        }

        let value = P::synthesize(self)?;
        self.bound.push(P::KIND);
        Ok(value)
    }

    pub(crate) fn into_bound(self) -> Vec<ParamKind> {
        self.bound
    }
}

/// The arguments built for one call, together with the kinds bound.
#[derive(Debug)]
pub struct Arguments<Args> {
    values: Args,
    kinds: Vec<ParamKind>,
}

impl<Args> Arguments<Args> {
    pub(crate) fn new(values: Args, kinds: Vec<ParamKind>) -> Self {
        Self { values, kinds }
    }

    /// The kind of each argument, in the order they were built.
    pub fn kinds(&self) -> &[ParamKind] {
        &self.kinds
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn into_values(self) -> Args {
        self.values
    }
}
