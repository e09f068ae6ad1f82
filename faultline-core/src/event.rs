//! Turning faults into events.
//!
//! Every fault reaches the client through the [`Fault`] trait.  Its accessors
//! are fallible and are each called in isolation: an accessor that returns an
//! error or panics only costs the event that one field.

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use regex::Regex;

use crate::constants::MAX_CAUSE_DEPTH;
use crate::error::FieldError;
use crate::logger::{panic_message, DisplayPanic};
use crate::protocol::{
    Event, Exception, Metadata, Severity, SeverityReason, SeverityReasonType, Stackframe, Value,
};
use crate::truncation;

/// The class used when a fault has none or it cannot be read.
pub const PLACEHOLDER_CLASS: &str = "Error";

/// The message used when a fault's message cannot be read.
pub const PLACEHOLDER_MESSAGE: &str = "[unreadable]";

lazy_static::lazy_static! {
    static ref FRAME_RE: Regex = Regex::new(r#"(?xm)
        ^
            [\ ]*(?:\d+:)[\ ]*                  # leading frame number
            (?:(?P<addr>0x[a-f0-9]+)[\ ]-[\ ])? # optional address
            (?P<symbol>[^\r\n]+)
            (?:
                \r?\n
                [\ \t]+at[\ ]
                (?P<path>[^\r\n]+?)
                (?::(?P<lineno>\d+))?
                (?::(?P<colno>\d+))?
            )?
        $
    "#).unwrap();

    static ref HASH_FUNC_RE: Regex = Regex::new(r#"(?x)
        ^(.*)::h[a-f0-9]{16}$
    "#).unwrap();

    static ref WELL_KNOWN_SYS_MODULES: Vec<&'static str> = vec![
        "std::",
        "core::",
        "alloc::",
        "backtrace::",
        "faultline::",
        "faultline_core::",
        "faultline_types::",
        // these are not modules but things like __rust_maybe_catch_panic
        "__rust_",
        "___rust_",
        "rust_begin_unwind",
        "<alloc::",
        "<core::",
        "<std::",
    ];
}

/// The place a fault originated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    /// The file the fault originated in.
    pub file: String,
    /// The 1-based line number.
    pub line: u32,
    /// The column, if known.
    pub column: Option<u32>,
}

impl Origin {
    /// Creates an origin from a file and line.
    pub fn new<S: Into<String>>(file: S, line: u32) -> Origin {
        Origin {
            file: file.into(),
            line,
            column: None,
        }
    }
}

impl<'a> From<&std::panic::Location<'a>> for Origin {
    fn from(location: &std::panic::Location<'a>) -> Origin {
        Origin {
            file: location.file().into(),
            line: location.line(),
            column: Some(location.column()),
        }
    }
}

/// The stack of a fault in whatever form the fault has it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RawStack {
    /// The fault has no stack.
    #[default]
    Missing,
    /// Frames that were already parsed, innermost first.
    Frames(Vec<Stackframe>),
    /// A textual backtrace as rendered by `std::backtrace::Backtrace`.
    Text(String),
    /// A stack that exists but cannot be interpreted.
    Opaque,
}

/// A captured fault, read field by field.
///
/// Implementations may fail (or even panic) in any accessor; the event
/// builder replaces the field with a placeholder in that case.
pub trait Fault {
    /// The class or type name of the fault.
    fn error_class(&self) -> Result<String, FieldError>;

    /// The human readable message, if the fault has one.
    fn message(&self) -> Result<Option<String>, FieldError>;

    /// The stack of the fault.
    fn stacktrace(&self) -> Result<RawStack, FieldError> {
        Ok(RawStack::Missing)
    }

    /// Where the fault originated, if known.
    fn origin(&self) -> Result<Option<Origin>, FieldError> {
        Ok(None)
    }

    /// The fault that caused this one.
    fn cause(&self) -> Result<Option<Box<dyn Fault + '_>>, FieldError> {
        Ok(None)
    }

    /// Extra metadata the fault contributes to the event.
    fn metadata(&self) -> Result<Option<Metadata>, FieldError> {
        Ok(None)
    }
}

impl fmt::Debug for dyn Fault + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fault")
            .field("error_class", &self.error_class().ok())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for dyn Fault + Send + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (self as &dyn Fault).fmt(f)
    }
}

/// Parse the types name from `Debug` output.
///
/// # Examples
///
/// ```
/// use faultline_core::parse_type_from_debug;
///
/// let err = "NaN".parse::<usize>().unwrap_err();
/// assert_eq!(&parse_type_from_debug(&err), "ParseIntError");
/// ```
pub fn parse_type_from_debug<D: fmt::Debug + ?Sized>(d: &D) -> String {
    let dbg = format!("{:#?}", d);

    dbg.split(&[' ', '(', '{', '\r', '\n'][..])
        .next()
        .unwrap_or(&dbg)
        .trim()
        .to_owned()
}

/// A fault backed by a `std::error::Error`.
///
/// The class is taken from the `Debug` output, the message from `Display`,
/// and causes from `Error::source`.
#[derive(Debug, Clone)]
pub struct ErrorFault<E> {
    error: E,
}

impl<E: Error> ErrorFault<E> {
    /// Wraps an error.
    pub fn new(error: E) -> ErrorFault<E> {
        ErrorFault { error }
    }

    /// Returns the wrapped error.
    pub fn into_inner(self) -> E {
        self.error
    }
}

impl<E: Error> Fault for ErrorFault<E> {
    fn error_class(&self) -> Result<String, FieldError> {
        Ok(parse_type_from_debug(&self.error))
    }

    fn message(&self) -> Result<Option<String>, FieldError> {
        Ok(Some(self.error.to_string()))
    }

    fn cause(&self) -> Result<Option<Box<dyn Fault + '_>>, FieldError> {
        Ok(self
            .error
            .source()
            .map(|source| Box::new(ErrorFault::new(source)) as Box<dyn Fault + '_>))
    }
}

/// A fault described field by field by an adapter.
#[derive(Debug, Clone, Default)]
pub struct RawFault {
    /// The class of the fault.
    pub error_class: Option<String>,
    /// The message of the fault.
    pub message: Option<String>,
    /// The stack of the fault.
    pub stack: RawStack,
    /// Where the fault originated.
    pub origin: Option<Origin>,
    /// The fault that caused this one.
    pub cause: Option<Box<RawFault>>,
}

impl RawFault {
    /// Creates a fault from a class and message.
    pub fn new<C: Into<String>, M: Into<String>>(error_class: C, message: M) -> RawFault {
        RawFault {
            error_class: Some(error_class.into()),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Sets the stack of the fault.
    pub fn with_stack(mut self, stack: RawStack) -> RawFault {
        self.stack = stack;
        self
    }

    /// Sets the origin of the fault.
    pub fn with_origin(mut self, origin: Origin) -> RawFault {
        self.origin = Some(origin);
        self
    }

    /// Sets the cause of the fault.
    pub fn with_cause(mut self, cause: RawFault) -> RawFault {
        self.cause = Some(Box::new(cause));
        self
    }
}

impl Fault for RawFault {
    fn error_class(&self) -> Result<String, FieldError> {
        self.error_class
            .clone()
            .ok_or_else(|| FieldError::new("error_class", "missing"))
    }

    fn message(&self) -> Result<Option<String>, FieldError> {
        Ok(self.message.clone())
    }

    fn stacktrace(&self) -> Result<RawStack, FieldError> {
        Ok(self.stack.clone())
    }

    fn origin(&self) -> Result<Option<Origin>, FieldError> {
        Ok(self.origin.clone())
    }

    fn cause(&self) -> Result<Option<Box<dyn Fault + '_>>, FieldError> {
        Ok(self
            .cause
            .as_deref()
            .map(|cause| Box::new(cause.clone()) as Box<dyn Fault + '_>))
    }
}

/// A panic surfaced by a panic hook.
#[derive(Debug, Clone, Default)]
pub struct PanicFault {
    message: String,
    origin: Option<Origin>,
    backtrace: Option<String>,
}

impl PanicFault {
    /// Creates a fault from a panic payload.
    pub fn from_payload(payload: &(dyn Any + Send)) -> PanicFault {
        PanicFault {
            message: panic_message(payload).to_owned(),
            ..Default::default()
        }
    }

    /// Creates a fault from the information passed to a panic hook.
    #[allow(deprecated)]
    pub fn from_panic_info(info: &std::panic::PanicInfo<'_>) -> PanicFault {
        PanicFault {
            message: panic_message(info.payload()).to_owned(),
            origin: info.location().map(Origin::from),
            backtrace: None,
        }
    }

    /// Attaches a rendered backtrace.
    pub fn with_backtrace<S: Into<String>>(mut self, backtrace: S) -> PanicFault {
        self.backtrace = Some(backtrace.into());
        self
    }
}

impl Fault for PanicFault {
    fn error_class(&self) -> Result<String, FieldError> {
        Ok("panic".into())
    }

    fn message(&self) -> Result<Option<String>, FieldError> {
        Ok(Some(self.message.clone()))
    }

    fn stacktrace(&self) -> Result<RawStack, FieldError> {
        Ok(match self.backtrace {
            Some(ref text) => RawStack::Text(text.clone()),
            None => RawStack::Missing,
        })
    }

    fn origin(&self) -> Result<Option<Origin>, FieldError> {
        Ok(self.origin.clone())
    }
}

/// A value that was reported where an error was expected.
///
/// The value itself ends up in a metadata tab named after the handler that
/// received it.
#[derive(Debug, Clone)]
pub struct NonErrorFault {
    handler: String,
    value: Value,
}

impl NonErrorFault {
    /// The metadata key holding the reported value.
    pub const METADATA_KEY: &'static str = "non-error parameter";

    /// Creates a fault for `value` as received by `handler`.
    pub fn new<H: Into<String>, V: Into<Value>>(handler: H, value: V) -> NonErrorFault {
        NonErrorFault {
            handler: handler.into(),
            value: value.into(),
        }
    }
}

impl Fault for NonErrorFault {
    fn error_class(&self) -> Result<String, FieldError> {
        Ok("InvalidError".into())
    }

    fn message(&self) -> Result<Option<String>, FieldError> {
        Ok(Some(format!(
            "{} received a non-error. See \"{}\" tab for more detail.",
            self.handler, self.handler
        )))
    }

    fn metadata(&self) -> Result<Option<Metadata>, FieldError> {
        let value = match self.value {
            Value::String(ref s) => s.clone(),
            ref other => other.to_string(),
        };
        let mut metadata = Metadata::new();
        metadata.add(self.handler.clone(), Self::METADATA_KEY, value);
        Ok(Some(metadata))
    }
}

/// Looks up the source of the file a fault originated in.
pub trait SourceProvider: Send + Sync {
    /// Returns the contents of `file`, if available.
    fn source(&self, file: &str) -> Option<String>;
}

impl<F> SourceProvider for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn source(&self, file: &str) -> Option<String> {
        self(file)
    }
}

impl fmt::Debug for dyn SourceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SourceProvider")
    }
}

/// Reads one field of a fault, containing errors and panics.
fn read_field<T>(
    debug: bool,
    field: &'static str,
    read: impl FnOnce() -> Result<T, FieldError>,
) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(read)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            faultline_debug!(debug, "{}", err);
            None
        }
        Err(payload) => {
            faultline_debug!(
                debug,
                "reading `{}` panicked: {}",
                field,
                DisplayPanic(&*payload)
            );
            None
        }
    }
}

fn sanitize_symbol(s: &str) -> &str {
    HASH_FUNC_RE
        .captures(s)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(s)
}

fn is_sys_function(func: &str) -> bool {
    WELL_KNOWN_SYS_MODULES.iter().any(|m| func.starts_with(m))
}

/// Parses a rendered Rust backtrace into frames, innermost first.
pub fn parse_stacktrace(bt: &str) -> Vec<Stackframe> {
    FRAME_RE
        .captures_iter(bt)
        .map(|captures| {
            let method = sanitize_symbol(&captures["symbol"]).trim().to_string();
            Stackframe {
                file: captures
                    .name("path")
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
                line_number: captures.name("lineno").and_then(|x| x.as_str().parse().ok()),
                column_number: captures.name("colno").and_then(|x| x.as_str().parse().ok()),
                in_project: Some(!is_sys_function(&method)),
                method,
                code: None,
            }
        })
        .collect()
}

fn frames_from(stack: RawStack) -> Vec<Stackframe> {
    match stack {
        RawStack::Frames(frames) => frames,
        RawStack::Text(text) => parse_stacktrace(&text),
        RawStack::Opaque | RawStack::Missing => Vec::new(),
    }
}

fn describe(fault: &dyn Fault, debug: bool) -> Exception {
    let error_class = read_field(debug, "error_class", || fault.error_class())
        .filter(|class| !class.is_empty())
        .unwrap_or_else(|| PLACEHOLDER_CLASS.into());
    let error_message = match read_field(debug, "message", || fault.message()) {
        Some(message) => message.unwrap_or_default(),
        None => PLACEHOLDER_MESSAGE.into(),
    };
    let stacktrace = read_field(debug, "stacktrace", || fault.stacktrace())
        .map(frames_from)
        .unwrap_or_default();
    Exception {
        error_class,
        error_message,
        stacktrace,
        ..Default::default()
    }
}

fn collect_errors(fault: &dyn Fault, out: &mut Vec<Exception>, debug: bool) {
    out.push(describe(fault, debug));
    if out.len() >= MAX_CAUSE_DEPTH {
        return;
    }
    if let Some(cause) = read_field(debug, "cause", || fault.cause()).flatten() {
        collect_errors(&*cause, out, debug);
    }
}

/// Returns `true` for reasons describing a fault nobody handled.
pub fn is_unhandled_reason(reason: SeverityReasonType) -> bool {
    matches!(
        reason,
        SeverityReasonType::UnhandledException
            | SeverityReasonType::UnhandledError
            | SeverityReasonType::UnhandledPromiseRejection
            | SeverityReasonType::UnhandledPanic
    )
}

/// Builds an event from a fault.
///
/// This never fails: unreadable fields are replaced with placeholders.  When
/// the fault has no frames but knows its origin, and `source` can provide the
/// origin's file, a single frame with surrounding source lines is
/// synthesized and the script is attached to the `script` metadata tab.
///
/// Unreadable fields are logged on the `faultline` target when `debug` is
/// set.
pub fn build_event(
    fault: &dyn Fault,
    severity: Severity,
    severity_reason: SeverityReason,
    source: Option<&dyn SourceProvider>,
    debug: bool,
) -> Event {
    let mut errors = Vec::new();
    collect_errors(fault, &mut errors, debug);

    let mut event = Event {
        errors,
        severity,
        unhandled: is_unhandled_reason(severity_reason.ty),
        severity_reason,
        ..Default::default()
    };

    if let Some(metadata) = read_field(debug, "metadata", || fault.metadata()).flatten() {
        event.metadata.merge(&metadata);
    }

    let frameless = event.errors.first().map_or(false, |e| e.stacktrace.is_empty());
    if let (true, Some(source)) = (frameless, source) {
        if let Some(origin) = read_field(debug, "origin", || fault.origin()).flatten() {
            attach_source_context(&mut event, &origin, source, debug);
        }
    }

    event
}

fn attach_source_context(
    event: &mut Event,
    origin: &Origin,
    provider: &dyn SourceProvider,
    debug: bool,
) {
    let script = match panic::catch_unwind(AssertUnwindSafe(|| provider.source(&origin.file))) {
        Ok(Some(script)) => script,
        Ok(None) => return,
        Err(payload) => {
            faultline_debug!(
                debug,
                "source provider panicked: {}",
                DisplayPanic(&*payload)
            );
            return;
        }
    };
    let frame = Stackframe {
        file: origin.file.clone(),
        line_number: Some(origin.line),
        column_number: origin.column,
        method: String::new(),
        in_project: Some(true),
        code: Some(truncation::surrounding_lines(&script, origin.line)),
    };
    if let Some(error) = event.errors.first_mut() {
        error.stacktrace.push(frame);
    }
    event.add_metadata("script", "content", truncation::script_content(&script));
}
