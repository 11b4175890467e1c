//! Study session countdown.
//!
//! A pure state machine with one-second resolution. It owns no thread or
//! task; [`super::SessionRunner`] calls `tick()` once per interval.
//!
//! ```text
//! Idle -> Running -> Completed
//!                 \-> Cancelled
//! ```
//!
//! `Completed` and `Cancelled` are terminal. Completion is reported at
//! most once per timer, however many ticks arrive afterwards.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::events::Event;
use crate::roster::{generate_id, Subject};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Completed => "completed",
            SessionState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionTimer {
    state: SessionState,
    #[serde(default)]
    session_id: String,
    #[serde(default)]
    child_id: String,
    #[serde(default)]
    subject_id: String,
    remaining_secs: u64,
    #[serde(default)]
    completion_fired: bool,
}

impl SessionTimer {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn child_id(&self) -> &str {
        &self.child_id
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Remaining time as `m:ss`.
    pub fn display(&self) -> String {
        format_clock(self.remaining_secs)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin counting down `subject`'s duration for `child_id`.
    pub fn start(&mut self, child_id: &str, subject: &Subject) -> Result<Event, SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::InvalidTransition {
                action: "start".into(),
                state: self.state.to_string(),
            });
        }
        self.session_id = generate_id();
        self.child_id = child_id.to_string();
        self.subject_id = subject.id.clone();
        self.remaining_secs = subject.duration_secs();
        self.completion_fired = false;
        self.state = SessionState::Running;
        Ok(Event::SessionStarted {
            session_id: self.session_id.clone(),
            child_id: self.child_id.clone(),
            subject_id: self.subject_id.clone(),
            duration_secs: self.remaining_secs,
            at: Utc::now(),
        })
    }

    /// Advance one second. Returns `SessionCompleted` on the tick that
    /// reaches zero, `SessionTicked` before that, and `None` once the
    /// timer is no longer running.
    pub fn tick(&mut self) -> Option<Event> {
        if self.state != SessionState::Running {
            return None;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs > 0 {
            return Some(Event::SessionTicked {
                session_id: self.session_id.clone(),
                remaining_secs: self.remaining_secs,
                display: self.display(),
            });
        }

        self.state = SessionState::Completed;
        if self.completion_fired {
            return None;
        }
        self.completion_fired = true;
        Some(Event::SessionCompleted {
            session_id: self.session_id.clone(),
            child_id: self.child_id.clone(),
            subject_id: self.subject_id.clone(),
            at: Utc::now(),
        })
    }

    /// Stop a running countdown. No-op in any other state.
    pub fn cancel(&mut self) -> Option<Event> {
        if self.state != SessionState::Running {
            return None;
        }
        self.state = SessionState::Cancelled;
        Some(Event::SessionCancelled {
            session_id: self.session_id.clone(),
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        })
    }
}

pub fn format_clock(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_minute() -> Subject {
        Subject::new("Math", 1).unwrap()
    }

    fn completions(events: &[Option<Event>]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, Some(Event::SessionCompleted { .. })))
            .count()
    }

    #[test]
    fn sixty_ticks_complete_exactly_once() {
        let mut timer = SessionTimer::new();
        timer.start("c1", &one_minute()).unwrap();
        let events: Vec<_> = (0..60).map(|_| timer.tick()).collect();
        assert_eq!(timer.state(), SessionState::Completed);
        assert_eq!(completions(&events), 1);
        assert!(matches!(events[59], Some(Event::SessionCompleted { .. })));

        let late: Vec<_> = (0..5).map(|_| timer.tick()).collect();
        assert_eq!(completions(&late), 0);
        assert_eq!(timer.remaining_secs(), 0);
    }

    #[test]
    fn fifty_nine_ticks_leave_one_second() {
        let mut timer = SessionTimer::new();
        timer.start("c1", &one_minute()).unwrap();
        for _ in 0..59 {
            timer.tick();
        }
        assert_eq!(timer.state(), SessionState::Running);
        assert_eq!(timer.remaining_secs(), 1);
        assert_eq!(timer.display(), "0:01");
    }

    #[test]
    fn cancel_is_terminal() {
        let mut timer = SessionTimer::new();
        timer.start("c1", &one_minute()).unwrap();
        timer.tick();
        assert!(matches!(
            timer.cancel(),
            Some(Event::SessionCancelled { remaining_secs: 59, .. })
        ));
        assert_eq!(timer.state(), SessionState::Cancelled);
        for _ in 0..120 {
            assert!(timer.tick().is_none());
        }
        assert_eq!(timer.remaining_secs(), 59);
        assert!(timer.cancel().is_none());
    }

    #[test]
    fn start_only_from_idle() {
        let mut timer = SessionTimer::new();
        timer.start("c1", &one_minute()).unwrap();
        let err = timer.start("c1", &one_minute()).unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidTransition {
                action: "start".into(),
                state: "running".into()
            }
        );
    }

    #[test]
    fn idle_timer_ignores_tick_and_cancel() {
        let mut timer = SessionTimer::new();
        assert!(timer.tick().is_none());
        assert!(timer.cancel().is_none());
        assert_eq!(timer.state(), SessionState::Idle);
    }

    #[test]
    fn clock_format_pads_seconds() {
        assert_eq!(format_clock(1500), "25:00");
        assert_eq!(format_clock(61), "1:01");
        assert_eq!(format_clock(0), "0:00");
    }

    #[test]
    fn snapshot_survives_serde() {
        let mut timer = SessionTimer::new();
        timer.start("c1", &one_minute()).unwrap();
        timer.tick();
        let json = serde_json::to_string(&timer).unwrap();
        let back: SessionTimer = serde_json::from_str(&json).unwrap();
        assert_eq!(back.state(), SessionState::Running);
        assert_eq!(back.remaining_secs(), 59);
        assert_eq!(back.child_id(), "c1");
    }
}
