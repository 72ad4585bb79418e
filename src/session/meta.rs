//! Session metadata for logging and introspection.
//!
//! Tracks lifecycle state and command counters. The metadata serializes to
//! JSON so transports can report it verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionId;

/// State of a session in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Session is accepting commands.
    #[default]
    Active,
    /// Transport ended the session (EOF, `exit`, connection close).
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Metadata for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Unique session identifier.
    pub id: SessionId,

    /// When the session was created.
    pub created_at: DateTime<Utc>,

    /// When the last command ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_command_at: Option<DateTime<Utc>>,

    /// Number of command lines processed, including failed ones.
    pub commands_run: u64,

    /// Current state of the session.
    pub state: SessionState,
}

impl SessionMetadata {
    #[must_use]
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            last_command_at: None,
            commands_run: 0,
            state: SessionState::Active,
        }
    }

    /// Records that a command line was processed.
    pub fn touch(&mut self) {
        self.last_command_at = Some(Utc::now());
        self.commands_run += 1;
    }

    pub fn set_closed(&mut self) {
        self.state = SessionState::Closed;
    }

    /// Serializes the metadata as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; none is expected for this type.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
