use thiserror::Error;

/// An error reading a single field of a [`Fault`](crate::Fault).
///
/// These never leave the event builder: the field is replaced with a
/// placeholder and the error is only logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to read `{field}`: {reason}")]
pub struct FieldError {
    /// The name of the field that could not be read.
    pub field: &'static str,
    /// Why the field could not be read.
    pub reason: String,
}

impl FieldError {
    /// Creates a new field error.
    pub fn new<R: Into<String>>(field: &'static str, reason: R) -> FieldError {
        FieldError {
            field,
            reason: reason.into(),
        }
    }
}

/// An invalid client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No API key was configured.
    #[error("no API key configured")]
    MissingApiKey,
    /// An endpoint is not an absolute http(s) URL.
    #[error("invalid endpoint `{0}`")]
    InvalidEndpoint(String),
}

/// The reason a payload could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The client has no transport, or it was shut down.
    #[error("no transport configured")]
    NoTransport,
    /// The transport failed to send the payload.
    #[error("transport error: {0}")]
    Transport(String),
    /// The collection endpoint refused the payload.
    #[error("payload rejected with status {status}")]
    Rejected {
        /// The HTTP status code of the response.
        status: u16,
    },
    /// The transport queue is full.
    #[error("delivery queue is full")]
    QueueFull,
    /// The payload could not be serialized.
    #[error("failed to serialize payload: {0}")]
    Serialization(String),
    /// The transport dropped the delivery callback without calling it.
    #[error("delivery was abandoned by the transport")]
    Abandoned,
    /// The transport panicked while sending.
    #[error("transport panicked: {0}")]
    TransportPanicked(String),
}
