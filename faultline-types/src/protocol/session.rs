use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::v4::User;

/// Handled and unhandled event counts of a session.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounts {
    /// The number of handled events reported during the session.
    pub handled: u32,
    /// The number of unhandled events reported during the session.
    pub unhandled: u32,
}

/// The session summary attached to events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// The session identifier.
    pub id: Uuid,
    /// When the session started.
    pub started_at: DateTime<Utc>,
    /// The event counts at the time the event was captured.
    #[serde(rename = "events")]
    pub counts: SessionCounts,
}

/// A session start as reported to the sessions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStart {
    /// The session identifier.
    pub id: Uuid,
    /// When the session started.
    pub started_at: DateTime<Utc>,
    /// The user the session belongs to.
    #[serde(default, skip_serializing_if = "User::is_empty")]
    pub user: User,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_counts_serialize_as_events() {
        let session = Session {
            id: Uuid::nil(),
            started_at: Utc::now(),
            counts: SessionCounts {
                handled: 2,
                unhandled: 1,
            },
        };
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["events"]["handled"], 2);
        assert_eq!(json["events"]["unhandled"], 1);
        assert!(json["startedAt"].is_string());
    }
}
