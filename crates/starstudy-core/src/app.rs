//! Application state holder.
//!
//! [`App`] sits between a front end and the core. It owns the sync
//! coordinator and at most one running study session, follows principal
//! changes from the auth provider, and turns session completion into
//! exactly one star for the session's child.

use std::collections::VecDeque;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::auth::{self, Principal, SignUpForm};
use crate::context::AppContext;
use crate::error::{CoreError, SessionError};
use crate::events::{Event, RosterSource};
use crate::roster::Parent;
use crate::session::{SessionRunner, SessionTimer};
use crate::sync::{LoadOutcome, StarOutcome, SyncCoordinator};

/// Cache key of the remembered principal.
pub const PRINCIPAL_KEY: &str = "principal";

pub struct App {
    coordinator: SyncCoordinator,
    session: Option<SessionRunner>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    principal_rx: watch::Receiver<Option<Principal>>,
    pending: VecDeque<Event>,
}

impl App {
    pub fn new(ctx: AppContext) -> Self {
        let principal_rx = ctx.auth.subscribe();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            coordinator: SyncCoordinator::new(ctx),
            session: None,
            events_tx,
            events_rx,
            principal_rx,
            pending: VecDeque::new(),
        }
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut SyncCoordinator {
        &mut self.coordinator
    }

    pub fn context(&self) -> &AppContext {
        self.coordinator.context()
    }

    /// Show the cached roster, then resolve the current principal.
    ///
    /// A principal remembered from an earlier run is handed back to the
    /// auth provider first, so a signed-in parent stays signed in across
    /// restarts.
    pub async fn start(&mut self) -> Result<Vec<Event>, CoreError> {
        let cached = self.coordinator.load_local()?;
        let mut events = vec![Event::RosterLoaded {
            children: cached,
            source: RosterSource::Cache,
            at: Utc::now(),
        }];

        let ctx = self.coordinator.context();
        if ctx.auth.current().is_none() {
            if let Some(principal) = ctx.local.get::<Principal>(PRINCIPAL_KEY)? {
                debug!(uid = %principal.uid, "restoring remembered principal");
                ctx.auth.restore(principal);
            }
        }

        let principal = self.principal_rx.borrow_and_update().clone();
        if principal.is_some() {
            events.extend(self.apply_principal(principal).await?);
        }
        Ok(events)
    }

    pub async fn sign_up(&mut self, form: &SignUpForm) -> Result<Parent, CoreError> {
        let result = auth::sign_up(self.coordinator.context(), form).await;
        self.principal_rx.borrow_and_update();
        result
    }

    /// Sign in and load the parent's roster.
    ///
    /// # Errors
    /// `AuthError::NotVerified` if the email is unverified; the provider
    /// is signed back out in that case.
    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<Vec<Event>, CoreError> {
        let result = auth::sign_in(self.coordinator.context(), email, password).await;
        self.principal_rx.borrow_and_update();
        let principal = result?;
        self.coordinator.context().local.put(PRINCIPAL_KEY, &principal)?;
        self.apply_principal(Some(principal)).await
    }

    pub async fn sign_out(&mut self) -> Result<Event, CoreError> {
        self.close_session();
        let ctx = self.coordinator.context();
        ctx.auth.sign_out().await?;
        ctx.local.remove(PRINCIPAL_KEY)?;
        self.principal_rx.borrow_and_update();
        self.coordinator.clear();
        self.coordinator.context().notifier.info("You have been signed out.");
        info!("signed out");
        Ok(Event::SignedOut { at: Utc::now() })
    }

    async fn apply_principal(&mut self, principal: Option<Principal>) -> Result<Vec<Event>, CoreError> {
        let outcome = self.coordinator.on_principal_changed(principal.as_ref()).await?;
        let mut events = Vec::new();
        match (principal, outcome) {
            (Some(p), LoadOutcome::Loaded { children }) => {
                events.push(Event::signed_in(&p));
                events.push(Event::RosterLoaded {
                    children,
                    source: RosterSource::Remote,
                    at: Utc::now(),
                });
            }
            (Some(p), _) => events.push(Event::signed_in(&p)),
            (None, _) => {
                self.close_session();
                self.coordinator.clear();
                events.push(Event::SignedOut { at: Utc::now() });
            }
        }
        Ok(events)
    }

    // ── Sessions ─────────────────────────────────────────────────────

    pub fn session_active(&self) -> bool {
        self.session.is_some()
    }

    /// Start a session for one of a child's subjects.
    ///
    /// # Errors
    /// `SessionError::AlreadyActive` while another session has not been
    /// completed, cancelled or closed; `NotFound` for an unknown child or
    /// subject.
    pub fn start_session(&mut self, child_id: &str, subject_id: &str) -> Result<Event, CoreError> {
        if self.session.is_some() {
            return Err(SessionError::AlreadyActive.into());
        }
        let child = self
            .coordinator
            .child(child_id)
            .ok_or_else(|| SessionError::NotFound {
                kind: "child".into(),
                id: child_id.to_string(),
            })?;
        let subject = child.subject(subject_id).ok_or_else(|| SessionError::NotFound {
            kind: "subject".into(),
            id: subject_id.to_string(),
        })?;

        let mut timer = SessionTimer::new();
        let started = timer.start(&child.id, subject)?;
        let period = self.coordinator.context().tick_interval;
        let runner = SessionRunner::spawn(timer, period, self.events_tx.clone());
        info!(session_id = %runner.session_id(), child_id, subject_id, "session started");
        self.session = Some(runner);
        Ok(started)
    }

    /// Cancel the running session. No star is awarded.
    ///
    /// Returns `None` when there is no session or its countdown already
    /// reached zero. A finished session stays active until
    /// [`App::next_event`] has delivered its completion and star.
    pub async fn cancel_session(&mut self) -> Option<Event> {
        let runner = self.session.as_mut()?;
        let event = runner.cancel().await;
        if event.is_some() {
            self.session = None;
            info!("session cancelled");
        } else {
            debug!("cancel arrived after the countdown finished");
        }
        event
    }

    /// Tear the session down without waiting, e.g. when its view closes.
    pub fn close_session(&mut self) {
        if let Some(runner) = self.session.take() {
            debug!(session_id = %runner.session_id(), child_id = %runner.child_id(), "session closed");
        }
    }

    /// Wait for the next event from the running session or the auth
    /// provider.
    ///
    /// Events from sessions that are no longer active are dropped.
    /// Completion of the active session awards its star before the
    /// completion event is returned, followed by a `StarAwarded` event.
    ///
    /// Without an active session this does not wait: it returns a
    /// pending principal change if there is one, otherwise `None`.
    pub async fn next_event(&mut self) -> Result<Option<Event>, CoreError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            if self.session.is_none() {
                if !self.principal_rx.has_changed().unwrap_or(false) {
                    return Ok(None);
                }
                self.follow_principal().await?;
                continue;
            }
            tokio::select! {
                Some(event) = self.events_rx.recv() => {
                    self.handle_session_event(event).await?;
                }
                Ok(()) = self.principal_rx.changed() => {
                    self.follow_principal().await?;
                }
            }
        }
    }

    async fn follow_principal(&mut self) -> Result<(), CoreError> {
        let principal = self.principal_rx.borrow_and_update().clone();
        let events = self.apply_principal(principal).await?;
        self.pending.extend(events);
        Ok(())
    }

    async fn handle_session_event(&mut self, event: Event) -> Result<(), CoreError> {
        let active = self.session.as_ref().map(|r| r.session_id().to_string());
        if event.session_id() != active.as_deref() {
            debug!(session_id = ?event.session_id(), "stale session event ignored");
            return Ok(());
        }

        if let Event::SessionCompleted { child_id, .. } = &event {
            let child_id = child_id.clone();
            self.session = None;
            self.pending.push_back(event);
            if let StarOutcome::Awarded { stars, sync } = self.coordinator.add_star(&child_id).await? {
                self.pending.push_back(Event::star_awarded(&child_id, stars, &sync));
            }
            return Ok(());
        }
        if let Event::SessionCancelled { .. } = &event {
            self.session = None;
        }
        self.pending.push_back(event);
        Ok(())
    }
}
