//! Broker configuration.

/// Options for a [`Broker`](crate::broker::Broker).
#[derive(Debug, Clone, Default)]
pub struct BrokerConfig {
    /// Write the encoded value for a successful `Result<T, E>` return.
    ///
    /// Off by default: only textual values are written for that shape and
    /// any other value produces a bare `200 OK`.
    pub encode_fallible_values: bool,
}
