//! Version 4 of the event payload protocol.
//!
//! Most constructs in the protocol map directly to types here.  Attribute
//! names on the wire are camelCase while the rust side uses the usual
//! snake_case; a few attributes are renamed where the wire name would clash
//! with a rust keyword (`type`) or is historic (`metaData`).

use std::fmt;
use std::str;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use super::payload::*;
pub use super::session::*;

/// An arbitrary (JSON) value.
pub mod value {
    pub use serde_json::value::{from_value, to_value, Map as JsonMap, Number, Value};
}

/// The internally used arbitrary data map type.
pub mod map {
    pub use std::collections::btree_map::{BTreeMap as Map, *};
}

/// An arbitrary (JSON) value.
pub use self::value::Value;

/// The internally used map type.
pub use self::map::Map;

/// A single metadata tab: a named group of arbitrary values.
pub type MetadataTab = Map<String, Value>;

/// An error used when parsing `Severity`.
#[derive(Debug, Error)]
#[error("invalid severity")]
pub struct ParseSeverityError;

/// Represents the severity of an event.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational events.
    Info,
    /// A warning.  Handled errors default to this severity.
    Warning,
    /// An error.  Unhandled errors always start at this severity.
    Error,
}

impl Default for Severity {
    fn default() -> Severity {
        Severity::Warning
    }
}

impl str::FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(string: &str) -> Result<Severity, Self::Err> {
        Ok(match string {
            "info" => Severity::Info,
            "warning" => Severity::Warning,
            "error" => Severity::Error,
            _ => return Err(ParseSeverityError),
        })
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Why an event has the severity and `unhandled` flag it has.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SeverityReasonType {
    /// An error value that was reported explicitly.
    HandledException,
    /// A handled error that was not an error value (a message, a log line).
    HandledError,
    /// An uncaught exception surfaced by a host adapter.
    UnhandledException,
    /// An unhandled error that was not an exception (a native crash).
    UnhandledError,
    /// A rejected promise or failed future nobody observed.
    UnhandledPromiseRejection,
    /// A panic surfaced by a panic hook.
    UnhandledPanic,
    /// The caller passed an explicit severity.
    UserSpecifiedSeverity,
    /// An `on_error` callback changed the severity.
    UserCallbackSetSeverity,
}

/// A structured explanation of the severity of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityReason {
    /// The reason type.
    #[serde(rename = "type")]
    pub ty: SeverityReasonType,
    /// Optional attributes further describing the reason.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, String>,
}

impl SeverityReason {
    /// Creates a reason without attributes.
    pub fn new(ty: SeverityReasonType) -> SeverityReason {
        SeverityReason {
            ty,
            attributes: Map::new(),
        }
    }

    /// Adds an attribute to the reason.
    pub fn with_attribute<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

impl Default for SeverityReason {
    fn default() -> SeverityReason {
        SeverityReason::new(SeverityReasonType::HandledException)
    }
}

/// Represents a single stack frame.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stackframe {
    /// The file the frame belongs to.
    #[serde(default)]
    pub file: String,
    /// The line number within `file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    /// The column number within the line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_number: Option<u32>,
    /// The function or method name.
    #[serde(default)]
    pub method: String,
    /// Whether the frame belongs to the application rather than a library.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_project: Option<bool>,
    /// Source lines around `line_number`, keyed by line number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Map<u32, String>>,
}

mod exception {
    pub fn default_type() -> String {
        "rust".into()
    }
}

/// A single error descriptor of an event.
///
/// Events carry one descriptor per error in a cause chain, outermost first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exception {
    /// The class (type name) of the error.
    #[serde(rename = "errorClass")]
    pub error_class: String,
    /// The human readable error message.
    #[serde(rename = "errorMessage", default)]
    pub error_message: String,
    /// The kind of stacktrace.
    #[serde(rename = "type", default = "exception::default_type")]
    pub ty: String,
    /// The stack frames, innermost first.
    #[serde(default)]
    pub stacktrace: Vec<Stackframe>,
}

impl Default for Exception {
    fn default() -> Exception {
        Exception {
            error_class: "Error".into(),
            error_message: String::new(),
            ty: exception::default_type(),
            stacktrace: Vec::new(),
        }
    }
}

/// Represents user info.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// The ID of the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The email address of the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// A human readable name of the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl User {
    /// Returns `true` if no attribute is set.
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.email.is_none() && self.name.is_none()
    }
}

/// An error used when parsing `BreadcrumbType`.
#[derive(Debug, Error)]
#[error("invalid breadcrumb type")]
pub struct ParseBreadcrumbTypeError;

/// The type of a breadcrumb.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreadcrumbType {
    /// A change of location or screen.
    Navigation,
    /// An outgoing network request.
    Request,
    /// Process and thread lifecycle changes.
    Process,
    /// A log message.
    Log,
    /// A user interaction.
    User,
    /// A change of application state.
    State,
    /// A previously reported error.
    Error,
    /// Anything else, recorded explicitly by the application.
    Manual,
}

impl BreadcrumbType {
    /// All breadcrumb types.
    pub const ALL: [BreadcrumbType; 8] = [
        BreadcrumbType::Navigation,
        BreadcrumbType::Request,
        BreadcrumbType::Process,
        BreadcrumbType::Log,
        BreadcrumbType::User,
        BreadcrumbType::State,
        BreadcrumbType::Error,
        BreadcrumbType::Manual,
    ];
}

impl Default for BreadcrumbType {
    fn default() -> BreadcrumbType {
        BreadcrumbType::Manual
    }
}

impl str::FromStr for BreadcrumbType {
    type Err = ParseBreadcrumbTypeError;

    fn from_str(string: &str) -> Result<BreadcrumbType, Self::Err> {
        Ok(match string {
            "navigation" => BreadcrumbType::Navigation,
            "request" => BreadcrumbType::Request,
            "process" => BreadcrumbType::Process,
            "log" => BreadcrumbType::Log,
            "user" => BreadcrumbType::User,
            "state" => BreadcrumbType::State,
            "error" => BreadcrumbType::Error,
            "manual" => BreadcrumbType::Manual,
            _ => return Err(ParseBreadcrumbTypeError),
        })
    }
}

impl fmt::Display for BreadcrumbType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            BreadcrumbType::Navigation => "navigation",
            BreadcrumbType::Request => "request",
            BreadcrumbType::Process => "process",
            BreadcrumbType::Log => "log",
            BreadcrumbType::User => "user",
            BreadcrumbType::State => "state",
            BreadcrumbType::Error => "error",
            BreadcrumbType::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// Represents a single breadcrumb.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breadcrumb {
    /// The timestamp of the breadcrumb.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// The type of the breadcrumb.
    #[serde(rename = "type", default)]
    pub ty: BreadcrumbType,
    /// A short human readable message.
    #[serde(rename = "name", default)]
    pub message: String,
    /// Primitive values describing the breadcrumb.
    #[serde(rename = "metaData", default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Breadcrumb {
    /// Creates a breadcrumb with the current time and no metadata.
    pub fn new<S: Into<String>>(message: S, ty: BreadcrumbType) -> Breadcrumb {
        Breadcrumb {
            timestamp: Utc::now(),
            ty,
            message: message.into(),
            metadata: Map::new(),
        }
    }
}

impl Default for Breadcrumb {
    fn default() -> Breadcrumb {
        Breadcrumb::new("", BreadcrumbType::default())
    }
}

/// Arbitrary structured data grouped into named tabs.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, MetadataTab>);

impl Metadata {
    /// Creates empty metadata.
    pub fn new() -> Metadata {
        Metadata::default()
    }

    /// Adds a single value to a tab, creating the tab if needed.
    pub fn add<T, K, V>(&mut self, tab: T, key: K, value: V)
    where
        T: Into<String>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.0
            .entry(tab.into())
            .or_default()
            .insert(key.into(), value.into());
    }

    /// Merges all values into a tab.  Existing keys are overwritten.
    pub fn add_tab<T: Into<String>>(&mut self, tab: T, values: MetadataTab) {
        self.0.entry(tab.into()).or_default().extend(values);
    }

    /// Returns a tab.
    pub fn tab(&self, tab: &str) -> Option<&MetadataTab> {
        self.0.get(tab)
    }

    /// Returns a single value of a tab.
    pub fn get(&self, tab: &str, key: &str) -> Option<&Value> {
        self.0.get(tab).and_then(|values| values.get(key))
    }

    /// Removes a whole tab.
    pub fn clear_tab(&mut self, tab: &str) {
        self.0.remove(tab);
    }

    /// Removes a single value of a tab.
    pub fn clear(&mut self, tab: &str, key: &str) {
        if let Some(values) = self.0.get_mut(tab) {
            values.remove(key);
            if values.is_empty() {
                self.0.remove(tab);
            }
        }
    }

    /// Merges `other` into `self`; values of `other` win per key.
    pub fn merge(&mut self, other: &Metadata) {
        for (tab, values) in other.0.iter() {
            self.add_tab(tab.clone(), values.clone());
        }
    }

    /// Returns `true` if there are no tabs.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over all tabs.
    pub fn tabs(&self) -> impl Iterator<Item = (&String, &MetadataTab)> {
        self.0.iter()
    }
}

/// Describes the application that reported the event.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    /// The application identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The version of the application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// The release stage (`production`, `staging`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_stage: Option<String>,
    /// The kind of application (`worker`, `server`, ...).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
}

/// Describes the device or host the application runs on.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// The hostname of the machine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// The operating system name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_name: Option<String>,
    /// The CPU architecture.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    /// Versions of runtimes and libraries, e.g. `rustc`.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub runtime_versions: Map<String, String>,
    /// The time at which the payload was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

/// Represents a full event.
///
/// The event is mutable while callbacks run.  Once the client has moved it
/// into an [`EventPayload`] it is only read again for serialization.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Overrides the API key of the payload for this event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// The errors of this event, outermost first.
    #[serde(default)]
    pub errors: Vec<Exception>,
    /// The severity of the event.
    #[serde(default)]
    pub severity: Severity,
    /// Whether the fault was unhandled.
    #[serde(default)]
    pub unhandled: bool,
    /// Why `severity` and `unhandled` have their values.
    #[serde(default)]
    pub severity_reason: SeverityReason,
    /// What the application was doing when the fault happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Overrides the grouping of the event on the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouping_hash: Option<String>,
    /// The affected user.
    #[serde(default, skip_serializing_if = "User::is_empty")]
    pub user: User,
    /// Breadcrumbs recorded before the event was captured.
    #[serde(default)]
    pub breadcrumbs: Vec<Breadcrumb>,
    /// Arbitrary metadata tabs.
    #[serde(rename = "metaData", default)]
    pub metadata: Metadata,
    /// The application descriptor.
    #[serde(default)]
    pub app: App,
    /// The device descriptor.
    #[serde(default)]
    pub device: Device,
    /// The session the event was counted in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
}

impl Event {
    /// Sets the affected user.
    pub fn set_user(&mut self, id: Option<&str>, email: Option<&str>, name: Option<&str>) {
        self.user = User {
            id: id.map(Into::into),
            email: email.map(Into::into),
            name: name.map(Into::into),
        };
    }

    /// Adds a metadata value to the event.
    pub fn add_metadata<T, K, V>(&mut self, tab: T, key: K, value: V)
    where
        T: Into<String>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.metadata.add(tab, key, value);
    }

    /// Looks up a metadata value of the event.
    pub fn get_metadata(&self, tab: &str, key: &str) -> Option<&Value> {
        self.metadata.get(tab, key)
    }

    /// Removes a metadata value, or a whole tab if `key` is `None`.
    pub fn clear_metadata(&mut self, tab: &str, key: Option<&str>) {
        match key {
            Some(key) => self.metadata.clear(tab, key),
            None => self.metadata.clear_tab(tab),
        }
    }

    /// Serializes the event into a JSON value.
    pub fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}
