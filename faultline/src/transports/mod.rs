//! The provided transports.
//!
//! This module exposes all transports that are compiled into the faultline
//! library.  The `reqwest` feature turns on the HTTP transport.

#[cfg(feature = "reqwest")]
use std::sync::Arc;

#[cfg(feature = "reqwest")]
use faultline_core::{ClientOptions, Transport, TransportFactory};

#[cfg(feature = "reqwest")]
mod ratelimit;
mod retry;
#[cfg(feature = "reqwest")]
mod thread;

#[cfg(feature = "reqwest")]
mod reqwest;
#[cfg(feature = "reqwest")]
pub use self::reqwest::ReqwestHttpTransport;

pub use self::retry::{classify_status, AttemptError, RetryPolicy, StatusClass};

/// The default http transport.
#[cfg(feature = "reqwest")]
pub type HttpTransport = ReqwestHttpTransport;

/// Creates the default HTTP transport.
///
/// This is the default value for `transport` on the client options when
/// the `reqwest` feature is enabled.  It creates a `HttpTransport`.
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct DefaultTransportFactory;

#[cfg(feature = "reqwest")]
impl TransportFactory for DefaultTransportFactory {
    fn create_transport(&self, options: &ClientOptions) -> Arc<dyn Transport> {
        Arc::new(HttpTransport::new(options))
    }
}
