//! Session tracking.
//!
//! A session is a window over which handled and unhandled events are
//! counted.  A client has at most one current session; starting a new one
//! replaces it.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::protocol::{Session, SessionCounts};
use crate::types::{random_uuid, Utc};

/// Creates a fresh session starting now.
pub fn new_session() -> Session {
    Session {
        id: random_uuid(),
        started_at: Utc::now(),
        counts: SessionCounts::default(),
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    current: Option<Session>,
    paused: bool,
}

/// Holds the current session and its counters.
#[derive(Debug, Default)]
pub struct SessionTracker {
    state: Mutex<TrackerState>,
}

impl SessionTracker {
    /// Creates a tracker without a session.
    pub fn new() -> SessionTracker {
        SessionTracker::default()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a new session, replacing the current one.
    pub fn start_session(&self) -> Session {
        self.install(new_session())
    }

    /// Makes `session` the current session.
    pub fn install(&self, session: Session) -> Session {
        let mut state = self.lock();
        state.current = Some(session.clone());
        state.paused = false;
        session
    }

    /// Stops counting without discarding the current session.
    pub fn pause_session(&self) {
        self.lock().paused = true;
    }

    /// Resumes counting in the paused session.
    ///
    /// Returns the resumed session, or `None` if there is no session to
    /// resume.
    pub fn resume_session(&self) -> Option<Session> {
        let mut state = self.lock();
        state.paused = false;
        state.current.clone()
    }

    /// The current session, unless there is none or it is paused.
    pub fn current_session(&self) -> Option<Session> {
        let state = self.lock();
        if state.paused {
            None
        } else {
            state.current.clone()
        }
    }

    /// Counts a handled event in the current session.
    pub fn increment_handled(&self) -> Option<Session> {
        self.count(false)
    }

    /// Counts an unhandled event in the current session.
    pub fn increment_unhandled(&self) -> Option<Session> {
        self.count(true)
    }

    /// Counts an event and returns the session as of that event.
    ///
    /// Without an active session nothing is counted.
    pub fn count(&self, unhandled: bool) -> Option<Session> {
        let mut state = self.lock();
        if state.paused {
            return None;
        }
        let session = state.current.as_mut()?;
        if unhandled {
            session.counts.unhandled += 1;
        } else {
            session.counts.handled += 1;
        }
        Some(session.clone())
    }
}
