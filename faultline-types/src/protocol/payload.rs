use std::io::Write;

use serde::{Deserialize, Serialize};

use super::v4::{App, Device, Event, SessionStart, Value};
use super::{EVENT_PAYLOAD_VERSION, SESSION_PAYLOAD_VERSION};

/// Identifies the library that produced a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notifier {
    /// The name of the notifier.
    pub name: String,
    /// The version of the notifier.
    pub version: String,
    /// Where to find out more about the notifier.
    pub url: String,
}

/// The body of a request to the events endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    /// The API key the events are reported for.
    pub api_key: String,
    /// The payload protocol version.
    pub payload_version: String,
    /// The notifier that produced the payload.
    pub notifier: Notifier,
    /// The events.
    pub events: Vec<Event>,
}

impl EventPayload {
    /// Creates a payload carrying a single event.
    pub fn new(api_key: String, notifier: Notifier, event: Event) -> EventPayload {
        EventPayload {
            api_key,
            payload_version: EVENT_PAYLOAD_VERSION.into(),
            notifier,
            events: vec![event],
        }
    }

    /// The API key to send the payload with.
    ///
    /// An event level override wins over the payload key.
    pub fn effective_api_key(&self) -> &str {
        self.events
            .first()
            .and_then(|event| event.api_key.as_deref())
            .unwrap_or(&self.api_key)
    }

    /// Serializes the payload into a JSON value.
    pub fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// Writes the payload as JSON into the given writer.
    pub fn to_writer<W: Write>(&self, writer: W) -> serde_json::Result<()> {
        serde_json::to_writer(writer, self)
    }
}

/// The body of a request to the sessions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPayload {
    /// The notifier that produced the payload.
    pub notifier: Notifier,
    /// The application descriptor.
    pub app: App,
    /// The device descriptor.
    pub device: Device,
    /// The sessions that were started.
    pub sessions: Vec<SessionStart>,
}

impl SessionPayload {
    /// The payload protocol version of session payloads.
    pub fn payload_version(&self) -> &'static str {
        SESSION_PAYLOAD_VERSION
    }

    /// Writes the payload as JSON into the given writer.
    pub fn to_writer<W: Write>(&self, writer: W) -> serde_json::Result<()> {
        serde_json::to_writer(writer, self)
    }
}
