//! Return shapes a wrapped function may have.

use serde::Serialize;

use crate::broker::error::BoxError;

/// A success value ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Textual string, written as its raw bytes.
    Text(String),
    /// A value serialized by the response encoder.
    Encoded(Vec<u8>),
    /// The encoder failed; holds its message.
    Unencodable(String),
}

impl Payload {
    /// Serialize `value` with the response encoder (JSON).
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => Payload::Encoded(bytes),
            Err(e) => Payload::Unencodable(e.to_string()),
        }
    }
}

/// What a wrapped function returned, by arity.
#[derive(Debug)]
pub enum ReturnShape {
    /// No return value: `()`.
    Empty,
    /// A lone error slot: `Result<(), E>`.
    Fallible(Option<BoxError>),
    /// A lone value: any [`ReplyValue`].
    Value(Payload),
    /// A value and an error: `Result<T, E>` with `T: ReplyValue`.
    Pair(Result<Payload, BoxError>),
}

/// A value-kind return.
///
/// Strings are written verbatim; [`Json`] and [`serde_json::Value`] go
/// through the encoder. Wrap any other `Serialize` type in [`Json`].
pub trait ReplyValue {
    fn into_payload(self) -> Payload;
}

impl ReplyValue for String {
    fn into_payload(self) -> Payload {
        Payload::Text(self)
    }
}

impl ReplyValue for &'static str {
    fn into_payload(self) -> Payload {
        Payload::Text(self.to_string())
    }
}

impl ReplyValue for serde_json::Value {
    fn into_payload(self) -> Payload {
        Payload::encode(&self)
    }
}

/// Marks a return value for serialization by the response encoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T: Serialize> ReplyValue for Json<T> {
    fn into_payload(self) -> Payload {
        Payload::encode(&self.0)
    }
}

/// The return type of a wrapped function.
pub trait Reply {
    fn into_shape(self) -> ReturnShape;
}

impl Reply for () {
    fn into_shape(self) -> ReturnShape {
        ReturnShape::Empty
    }
}

impl<E: Into<BoxError>> Reply for Result<(), E> {
    fn into_shape(self) -> ReturnShape {
        ReturnShape::Fallible(self.err().map(Into::into))
    }
}

impl<T: ReplyValue, E: Into<BoxError>> Reply for Result<T, E> {
    fn into_shape(self) -> ReturnShape {
        ReturnShape::Pair(self.map(ReplyValue::into_payload).map_err(Into::into))
    }
}

macro_rules! reply_value {
    ($($ty:ty),*) => {
        $(
            impl Reply for $ty {
                fn into_shape(self) -> ReturnShape {
                    ReturnShape::Value(self.into_payload())
                }
            }
        )*
    };
}

reply_value!(String, &'static str, serde_json::Value);

impl<T: Serialize> Reply for Json<T> {
    fn into_shape(self) -> ReturnShape {
        ReturnShape::Value(self.into_payload())
    }
}
