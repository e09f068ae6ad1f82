//! This module exposes the types for the notifier protocol.

pub mod v4;

mod payload;
mod session;

/// The version of the event payload protocol.
pub const EVENT_PAYLOAD_VERSION: &str = "4";

/// The version of the session payload protocol.
pub const SESSION_PAYLOAD_VERSION: &str = "1.0";

/// The always latest protocol version.
pub mod latest {
    pub use super::v4::*;
}
