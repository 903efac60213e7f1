//! Dispatch errors and the distinguished `Unauthorized` sentinel.

use std::error::Error as StdError;
use thiserror::Error;

/// Boxed error returned by strategies and wrapped functions.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// The sentinel returned when authentication fails.
///
/// The cause reported by the authenticator is never surfaced to the client;
/// every authentication failure is this one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("UnAuthorized")]
pub struct Unauthorized;

/// Why a dispatch did not reach a successful response.
///
/// Every variant displays as its inner message unchanged, which is what the
/// client sees in the `code` field of the error body.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The authenticator rejected the request.
    #[error(transparent)]
    Unauthorized(#[from] Unauthorized),

    /// The decoder could not produce a body parameter.
    #[error("{0}")]
    Decode(BoxError),

    /// The validator rejected a decoded body parameter.
    #[error("{0}")]
    Invalid(BoxError),

    /// The wrapped function returned an error.
    #[error("{0}")]
    Application(BoxError),
}

impl DispatchError {
    /// The error that sentinel lookups are matched against.
    pub fn cause(&self) -> &(dyn StdError + 'static) {
        match self {
            DispatchError::Unauthorized(sentinel) => sentinel as &(dyn StdError + 'static),
            DispatchError::Decode(e) | DispatchError::Invalid(e) | DispatchError::Application(e) => {
                e.as_ref() as &(dyn StdError + 'static)
            }
        }
    }
}
