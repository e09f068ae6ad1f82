use std::sync::Arc;
use std::time::Duration;

use crate::delivery::DeliveryCallback;
use crate::protocol::{EventPayload, SessionPayload};
use crate::ClientOptions;

/// The trait for transports.
///
/// A transport is responsible for sending payloads to the collection
/// endpoints.  Every `send_*` call hands over a callback that the transport
/// must eventually call exactly once with the outcome; dropping it without
/// calling it is reported as an abandoned delivery.
///
/// Retries, backoff and offline queueing are entirely up to the transport.
pub trait Transport: Send + Sync + 'static {
    /// Sends an event payload.
    fn send_event(&self, payload: EventPayload, callback: DeliveryCallback);

    /// Sends a session payload.
    fn send_session(&self, payload: SessionPayload, callback: DeliveryCallback);

    /// Flushes the transport queue if there is one.
    ///
    /// Returns `true` if the queue was drained within `timeout`.
    fn flush(&self, timeout: Duration) -> bool {
        let _timeout = timeout;
        true
    }

    /// Instructs the transport to shut down.
    fn shutdown(&self, timeout: Duration) -> bool {
        self.flush(timeout)
    }
}

/// A factory creating transport instances.
///
/// Because options are potentially reused between different clients the
/// options do not actually contain a transport but a factory object that
/// can create transports instead.
///
/// The factory has a single method that creates a new arced transport.
/// Because transports can be wrapped in `Arc`s and those are clonable
/// any `Arc<Transport>` is also a valid transport factory.  This for
/// instance lets you put a `Arc<TestTransport>` directly into the options.
///
/// This is automatically implemented for all closures optionally taking
/// options and returning a boxed factory.
pub trait TransportFactory: Send + Sync {
    /// Given some options creates a transport.
    fn create_transport(&self, options: &ClientOptions) -> Arc<dyn Transport>;
}

impl<F> TransportFactory for F
where
    F: Fn(&ClientOptions) -> Arc<dyn Transport> + Clone + Send + Sync + 'static,
{
    fn create_transport(&self, options: &ClientOptions) -> Arc<dyn Transport> {
        (*self)(options)
    }
}

impl<T: Transport> TransportFactory for Arc<T> {
    fn create_transport(&self, options: &ClientOptions) -> Arc<dyn Transport> {
        let _options = options;
        self.clone()
    }
}
