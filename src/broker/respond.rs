//! Turning return values and errors into responses.

use std::any::type_name;
use std::error::Error as StdError;
use std::iter::successors;
use serde::Serialize;
use log::{debug, error};

use crate::broker::config::BrokerConfig;
use crate::broker::error::{DispatchError, Unauthorized};
use crate::broker::reply::{Payload, ReturnShape};
use crate::server::{ResponseWriter, StatusCode};

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
}

#[derive(Clone)]
struct Sentinel {
    name: &'static str,
    matches: fn(&(dyn StdError + 'static)) -> bool,
    status: StatusCode,
}

fn matches_type<E: StdError + 'static>(error: &(dyn StdError + 'static)) -> bool {
    error.is::<E>()
}

/// Maps errors to a status code and a `{"code": "<message>"}` body.
///
/// Sentinel error types are looked up in registration order; the first match
/// decides the status. Anything unmatched is `400 Bad Request`. The default
/// table maps [`Unauthorized`] to `403 Forbidden`.
#[derive(Clone)]
pub struct ErrorResponder {
    sentinels: Vec<Sentinel>,
}

impl ErrorResponder {
    /// A responder with no sentinels at all.
    pub fn empty() -> Self {
        Self { sentinels: Vec::new() }
    }

    /// Route errors of type `E` to `status`.
    pub fn with_sentinel<E: StdError + 'static>(mut self, status: StatusCode) -> Self {
        self.sentinels.push(Sentinel {
            name: type_name::<E>(),
            matches: matches_type::<E>,
            status,
        });
        self
    }

    /// The status `error` maps to.
    ///
    /// The cause and each of its sources are tried in turn, outermost first.
    pub fn status_for(&self, error: &DispatchError) -> StatusCode {
        successors(Some(error.cause()), |&e| e.source())
            .find_map(|cause| self.sentinels.iter().find(|sentinel| (sentinel.matches)(cause)))
            .map_or(StatusCode::BadRequest, |sentinel| sentinel.status)
    }

    /// Write the status and error body for `error`.
    pub fn respond(&self, writer: &ResponseWriter, error: &DispatchError) {
        let status = self.status_for(error);
        let message = error.to_string();
        debug!("Responding {code} to: {message}", code = status.as_u16());

        writer.set_header("Content-Type", JSON_CONTENT_TYPE);
        writer.write_header(status);
        match serde_json::to_vec(&ErrorBody { code: &message }) {
            Ok(body) => {
                writer.write(&body);
            }
            Err(e) => error!("Failed to encode error body: {e}"),
        }
    }
}

impl Default for ErrorResponder {
    fn default() -> Self {
        Self::empty().with_sentinel::<Unauthorized>(StatusCode::Forbidden)
    }
}

impl std::fmt::Debug for ErrorResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.sentinels.iter().map(|s| (s.name, s.status)))
            .finish()
    }
}

/// Write the response for a wrapped function's return value.
pub(crate) fn write_reply(
    shape: ReturnShape,
    writer: &ResponseWriter,
    responder: &ErrorResponder,
    config: &BrokerConfig,
) {
    match shape {
        ReturnShape::Empty | ReturnShape::Fallible(None) => {
            writer.write_header(StatusCode::Ok);
        }
        ReturnShape::Fallible(Some(e)) => responder.respond(writer, &DispatchError::Application(e)),
        ReturnShape::Value(payload) => write_payload(writer, payload),
        ReturnShape::Pair(Err(e)) => {
            debug!("Discarding returned value, function failed: {e}");
            writer.write_header(StatusCode::BadRequest);
        }
        ReturnShape::Pair(Ok(payload @ Payload::Text(_))) => write_payload(writer, payload),
        ReturnShape::Pair(Ok(payload)) if config.encode_fallible_values => write_payload(writer, payload),
        ReturnShape::Pair(Ok(_)) => {
            debug!("Returned value not written, encode_fallible_values is off");
            writer.write_header(StatusCode::Ok);
        }
    }
}

fn write_payload(writer: &ResponseWriter, payload: Payload) {
    match payload {
        Payload::Text(text) => {
            writer.set_header("Content-Type", TEXT_CONTENT_TYPE);
            writer.write_header(StatusCode::Ok);
            writer.write(text.as_bytes());
        }
        Payload::Encoded(bytes) => {
            writer.set_header("Content-Type", JSON_CONTENT_TYPE);
            writer.write_header(StatusCode::Ok);
            writer.write(&bytes);
        }
        Payload::Unencodable(message) => {
            error!("Failed to encode response value: {message}");
            writer.write_header(StatusCode::Ok);
        }
    }
}
