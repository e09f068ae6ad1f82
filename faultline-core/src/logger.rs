//! Diagnostics for failures the pipeline swallows.

use std::fmt;

/// Receives diagnostics about failures inside the reporting pipeline.
///
/// Nothing in the client depends on a logger for correctness; it only
/// exists so swallowed failures (a panicking callback, a failed delivery)
/// are not entirely silent.
pub trait Logger: Send + Sync {
    /// Reports a failure that was contained.
    fn error(&self, msg: &str);
    /// Reports a suspicious but harmless condition.
    fn warn(&self, msg: &str);
}

/// The default logger, forwarding to the `log` crate on the `faultline`
/// target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogLogger;

impl Logger for LogLogger {
    fn error(&self, msg: &str) {
        log::error!(target: "faultline", "{}", msg);
    }

    fn warn(&self, msg: &str) {
        log::warn!(target: "faultline", "{}", msg);
    }
}

impl<F> Logger for F
where
    F: Fn(log::Level, &str) + Send + Sync,
{
    fn error(&self, msg: &str) {
        self(log::Level::Error, msg)
    }

    fn warn(&self, msg: &str) {
        self(log::Level::Warn, msg)
    }
}

pub(crate) struct DisplayPanic<'a>(pub &'a (dyn std::any::Any + Send));

impl fmt::Display for DisplayPanic<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(panic_message(self.0))
    }
}

/// Extracts the message of a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    match payload.downcast_ref::<&'static str>() {
        Some(s) => s,
        None => match payload.downcast_ref::<String>() {
            Some(s) => &s[..],
            None => "Box<dyn Any>",
        },
    }
}
