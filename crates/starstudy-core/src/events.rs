use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Principal;
use crate::roster::Child;
use crate::sync::SyncOutcome;

/// Where a roster snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RosterSource {
    Cache,
    Remote,
}

/// Every observable state change produces an Event.
/// Front ends render them; the CLI prints them as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    RosterLoaded {
        children: usize,
        source: RosterSource,
        at: DateTime<Utc>,
    },
    ChildAdded {
        child_id: String,
        name: String,
        synced: bool,
        at: DateTime<Utc>,
    },
    ChildDeleted {
        child_id: String,
        synced: bool,
        at: DateTime<Utc>,
    },
    StarAwarded {
        child_id: String,
        stars: u32,
        synced: bool,
        at: DateTime<Utc>,
    },
    SessionStarted {
        session_id: String,
        child_id: String,
        subject_id: String,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    /// One second elapsed. `display` is the remaining time as `m:ss`.
    SessionTicked {
        session_id: String,
        remaining_secs: u64,
        display: String,
    },
    SessionCompleted {
        session_id: String,
        child_id: String,
        subject_id: String,
        at: DateTime<Utc>,
    },
    SessionCancelled {
        session_id: String,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    SignedIn {
        uid: String,
        email: String,
        at: DateTime<Utc>,
    },
    SignedOut {
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn child_added(child: &Child, sync: &SyncOutcome) -> Self {
        Event::ChildAdded {
            child_id: child.id.clone(),
            name: child.name.clone(),
            synced: sync.is_synced(),
            at: Utc::now(),
        }
    }

    pub fn child_deleted(child_id: &str, sync: &SyncOutcome) -> Self {
        Event::ChildDeleted {
            child_id: child_id.to_string(),
            synced: sync.is_synced(),
            at: Utc::now(),
        }
    }

    pub fn star_awarded(child_id: &str, stars: u32, sync: &SyncOutcome) -> Self {
        Event::StarAwarded {
            child_id: child_id.to_string(),
            stars,
            synced: sync.is_synced(),
            at: Utc::now(),
        }
    }

    pub fn signed_in(principal: &Principal) -> Self {
        Event::SignedIn {
            uid: principal.uid.clone(),
            email: principal.email.clone(),
            at: Utc::now(),
        }
    }

    /// Session this event belongs to, if any.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Event::SessionStarted { session_id, .. }
            | Event::SessionTicked { session_id, .. }
            | Event::SessionCompleted { session_id, .. }
            | Event::SessionCancelled { session_id, .. } => Some(session_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let event = Event::SignedOut { at: Utc::now() };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "SignedOut");
        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn session_id_only_for_session_events() {
        let tick = Event::SessionTicked {
            session_id: "s1".into(),
            remaining_secs: 5,
            display: "0:05".into(),
        };
        assert_eq!(tick.session_id(), Some("s1"));
        assert_eq!(Event::SignedOut { at: Utc::now() }.session_id(), None);
    }
}
