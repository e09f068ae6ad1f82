//! Hands payloads to the transport and reports the outcome exactly once.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread;
use std::time::Duration;

use crate::error::DeliveryError;
use crate::logger::{DisplayPanic, Logger};
use crate::protocol::{EventPayload, SessionPayload};
use crate::Transport;

/// The callback a transport calls with the result of a send.
pub type DeliveryCallback = Box<dyn FnOnce(Result<(), DeliveryError>) + Send>;

/// The final outcome of a `notify` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The transport accepted the payload.
    Delivered,
    /// The event was discarded before delivery, e.g. by a callback.
    Discarded,
    /// Delivery was attempted and failed.
    Failed(DeliveryError),
}

impl DeliveryOutcome {
    /// Returns `true` if the payload was delivered.
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }

    /// The delivery error, if delivery failed.
    pub fn error(&self) -> Option<&DeliveryError> {
        match self {
            DeliveryOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

impl From<Result<(), DeliveryError>> for DeliveryOutcome {
    fn from(result: Result<(), DeliveryError>) -> DeliveryOutcome {
        match result {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(err) => DeliveryOutcome::Failed(err),
        }
    }
}

struct Reporter {
    what: &'static str,
    callback: Mutex<Option<DeliveryCallback>>,
    logger: Arc<dyn Logger>,
    debug: bool,
}

impl Reporter {
    fn is_pending(&self) -> bool {
        self.callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn report(&self, result: Result<(), DeliveryError>) {
        let callback = self
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let callback = match callback {
            Some(callback) => callback,
            None => {
                self.logger.warn(&format!(
                    "{} delivery outcome was reported more than once; ignoring {:?}",
                    self.what, result
                ));
                return;
            }
        };
        match result {
            Ok(()) => faultline_debug!(self.debug, "{} delivered", self.what),
            Err(ref err) => self
                .logger
                .error(&format!("failed to deliver {}: {}", self.what, err)),
        }
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(result))) {
            self.logger.error(&format!(
                "{} completion handler panicked: {}",
                self.what,
                DisplayPanic(&*payload)
            ));
        }
    }
}

/// The transport side of a delivery.  Dropping it unreported counts as a
/// failed delivery.
struct ReportHandle(Arc<Reporter>);

impl ReportHandle {
    fn finish(self, result: Result<(), DeliveryError>) {
        self.0.report(result);
    }
}

impl Drop for ReportHandle {
    fn drop(&mut self) {
        if !self.0.is_pending() {
            return;
        }
        if thread::panicking() {
            self.0.report(Err(DeliveryError::TransportPanicked(
                "panicked while holding the delivery callback".into(),
            )));
        } else {
            self.0.report(Err(DeliveryError::Abandoned));
        }
    }
}

/// Coordinates delivery through an injected [`Transport`].
///
/// Exactly one send is initiated per payload and its outcome reaches the
/// report callback exactly once, whatever the transport does.
pub struct Delivery {
    transport: RwLock<Option<Arc<dyn Transport>>>,
    logger: Arc<dyn Logger>,
    debug: bool,
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl Delivery {
    /// Creates a coordinator for the given transport.
    ///
    /// With `debug` set, successful deliveries are logged on the
    /// `faultline` target.
    pub fn new(
        transport: Option<Arc<dyn Transport>>,
        logger: Arc<dyn Logger>,
        debug: bool,
    ) -> Delivery {
        Delivery {
            transport: RwLock::new(transport),
            logger,
            debug,
        }
    }

    /// Returns `true` if a transport is available.
    pub fn is_enabled(&self) -> bool {
        self.transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn transport(&self) -> Option<Arc<dyn Transport>> {
        self.transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sends an event payload; `report` receives the outcome.
    pub fn deliver_event(&self, payload: EventPayload, report: DeliveryCallback) {
        self.dispatch("event", report, move |transport, callback| {
            transport.send_event(payload, callback)
        });
    }

    /// Sends a session payload; `report` receives the outcome.
    pub fn deliver_session(&self, payload: SessionPayload, report: DeliveryCallback) {
        self.dispatch("session", report, move |transport, callback| {
            transport.send_session(payload, callback)
        });
    }

    fn dispatch<F>(&self, what: &'static str, report: DeliveryCallback, send: F)
    where
        F: FnOnce(&dyn Transport, DeliveryCallback),
    {
        let reporter = Arc::new(Reporter {
            what,
            callback: Mutex::new(Some(report)),
            logger: self.logger.clone(),
            debug: self.debug,
        });

        let transport = match self.transport() {
            Some(transport) => transport,
            None => {
                reporter.report(Err(DeliveryError::NoTransport));
                return;
            }
        };

        let handle = ReportHandle(reporter.clone());
        let callback: DeliveryCallback = Box::new(move |result| handle.finish(result));
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| send(&*transport, callback)))
        {
            if reporter.is_pending() {
                reporter.report(Err(DeliveryError::TransportPanicked(
                    DisplayPanic(&*payload).to_string(),
                )));
            }
        }
    }

    /// Drains the transport queue.
    pub fn flush(&self, timeout: Duration) -> bool {
        match self.transport() {
            Some(transport) => transport.flush(timeout),
            None => true,
        }
    }

    /// Shuts the transport down and removes it.  Later deliveries fail with
    /// [`DeliveryError::NoTransport`].
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let transport = self
            .transport
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match transport {
            Some(transport) => transport.shutdown(timeout),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::constants::NOTIFIER;
    use crate::protocol::Event;

    #[derive(Default)]
    struct RecordingLogger {
        errors: Mutex<Vec<String>>,
        warnings: Mutex<Vec<String>>,
    }

    impl Logger for RecordingLogger {
        fn error(&self, msg: &str) {
            self.errors.lock().unwrap().push(msg.into());
        }
        fn warn(&self, msg: &str) {
            self.warnings.lock().unwrap().push(msg.into());
        }
    }

    enum Behavior {
        Succeed,
        Fail,
        Drop,
        Panic,
        SucceedThenPanic,
        Stash,
    }

    struct FakeTransport {
        behavior: Behavior,
        stash: Mutex<Vec<DeliveryCallback>>,
    }

    impl FakeTransport {
        fn new(behavior: Behavior) -> Arc<FakeTransport> {
            Arc::new(FakeTransport {
                behavior,
                stash: Mutex::new(vec![]),
            })
        }
    }

    impl Transport for FakeTransport {
        fn send_event(&self, _payload: EventPayload, callback: DeliveryCallback) {
            match self.behavior {
                Behavior::Succeed => callback(Ok(())),
                Behavior::Fail => callback(Err(DeliveryError::Rejected { status: 400 })),
                Behavior::Drop => drop(callback),
                Behavior::Panic => {
                    let _keep = callback;
                    panic!("socket on fire");
                }
                Behavior::SucceedThenPanic => {
                    callback(Ok(()));
                    panic!("late panic");
                }
                Behavior::Stash => {
                    self.stash.lock().unwrap().push(callback);
                    panic!("panicked after stashing");
                }
            }
        }

        fn send_session(&self, _payload: SessionPayload, callback: DeliveryCallback) {
            callback(Ok(()))
        }
    }

    fn payload() -> EventPayload {
        EventPayload::new("key".into(), NOTIFIER.clone(), Event::default())
    }

    fn deliver(
        transport: Option<Arc<dyn Transport>>,
    ) -> (Vec<Result<(), DeliveryError>>, Arc<RecordingLogger>) {
        let logger = Arc::new(RecordingLogger::default());
        let delivery = Delivery::new(transport, logger.clone(), false);
        let (tx, rx) = mpsc::channel();
        delivery.deliver_event(payload(), Box::new(move |result| tx.send(result).unwrap()));
        drop(delivery);
        (rx.try_iter().collect(), logger)
    }

    #[test]
    fn test_success_is_reported_once() {
        let (results, logger) = deliver(Some(FakeTransport::new(Behavior::Succeed)));
        assert_eq!(results, vec![Ok(())]);
        assert!(logger.errors.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failure_is_reported_and_logged() {
        let (results, logger) = deliver(Some(FakeTransport::new(Behavior::Fail)));
        assert_eq!(results, vec![Err(DeliveryError::Rejected { status: 400 })]);
        assert_eq!(logger.errors.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_transport() {
        let (results, _) = deliver(None);
        assert_eq!(results, vec![Err(DeliveryError::NoTransport)]);
    }

    #[test]
    fn test_dropped_callback_is_abandoned() {
        let (results, _) = deliver(Some(FakeTransport::new(Behavior::Drop)));
        assert_eq!(results, vec![Err(DeliveryError::Abandoned)]);
    }

    #[test]
    fn test_panicking_transport() {
        let (results, _) = deliver(Some(FakeTransport::new(Behavior::Panic)));
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(DeliveryError::TransportPanicked(_))));
    }

    #[test]
    fn test_panic_after_reporting_keeps_first_outcome() {
        let (results, _) = deliver(Some(FakeTransport::new(Behavior::SucceedThenPanic)));
        assert_eq!(results, vec![Ok(())]);
    }

    #[test]
    fn test_late_report_is_ignored() {
        let transport = FakeTransport::new(Behavior::Stash);
        let (results, logger) = deliver(Some(transport.clone()));
        assert_eq!(
            results,
            vec![Err(DeliveryError::TransportPanicked("panicked after stashing".into()))]
        );

        let stashed = transport.stash.lock().unwrap().pop().unwrap();
        stashed(Ok(()));
        assert_eq!(logger.warnings.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_shutdown_removes_transport() {
        let logger = Arc::new(RecordingLogger::default());
        let delivery = Delivery::new(Some(FakeTransport::new(Behavior::Succeed)), logger, false);
        assert!(delivery.is_enabled());
        assert!(delivery.shutdown(Duration::from_millis(10)));
        assert!(!delivery.is_enabled());

        let (tx, rx) = mpsc::channel();
        delivery.deliver_event(payload(), Box::new(move |result| tx.send(result).unwrap()));
        assert_eq!(rx.recv().unwrap(), Err(DeliveryError::NoTransport));
    }
}
