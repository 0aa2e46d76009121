use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::event::AgentEvent;

/// Conversation identifier assigned by the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    /// Ordinal of the frame that carried the assignment.
    pub assigned_at: u64,
}

/// Records the session assigned on one stream.
///
/// The first `SessionAssigned` wins; later ones in the same stream are
/// reported but never replace it.
#[derive(Clone, Debug, Default)]
pub struct SessionTracker {
    session: Option<Session>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks at a dispatched event. Returns true when it assigned the session.
    pub fn observe(&mut self, frame: u64, event: &AgentEvent) -> bool {
        let AgentEvent::SessionAssigned { session_id } = event else {
            return false;
        };
        match &self.session {
            Some(current) => {
                if current.id != *session_id {
                    debug!(current = %current.id, ignored = %session_id, frame, "ignoring repeated session assignment");
                }
                false
            }
            None => {
                self.session = Some(Session {
                    id: session_id.clone(),
                    assigned_at: frame,
                });
                true
            }
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.id.as_str())
    }

    pub fn into_session(self) -> Option<Session> {
        self.session
    }
}
