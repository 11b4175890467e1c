//! Transient user-facing notifications.
//!
//! One banner is visible at a time: raising a notification replaces the
//! current one, and a banner expires after the configured lifetime.
//! Every notification is also broadcast so front ends can render or log
//! them as they arrive.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Slot {
    notification: Notification,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct Notifier {
    ttl: Duration,
    slot: Mutex<Option<Slot>>,
    tx: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new(ttl: Duration) -> Self {
        let (tx, _) = broadcast::channel(32);
        Self {
            ttl,
            slot: Mutex::new(None),
            tx,
        }
    }

    pub fn success(&self, message: impl Into<String>) {
        self.raise(NotificationKind::Success, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.raise(NotificationKind::Error, message.into());
    }

    pub fn info(&self, message: impl Into<String>) {
        self.raise(NotificationKind::Info, message.into());
    }

    pub fn raise(&self, kind: NotificationKind, message: String) {
        let notification = Notification {
            kind,
            message,
            raised_at: Utc::now(),
        };
        debug!(?kind, message = %notification.message, "notification");
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(Slot {
            notification: notification.clone(),
            expires_at: Instant::now() + self.ttl,
        });
        // No subscribers is fine.
        let _ = self.tx.send(notification);
    }

    /// The visible banner, if it has not expired.
    pub fn current(&self) -> Option<Notification> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        match slot.as_ref() {
            Some(s) if Instant::now() < s.expires_at => Some(s.notification.clone()),
            Some(_) => {
                *slot = None;
                None
            }
            None => None,
        }
    }

    pub fn dismiss(&self) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(Duration::from_secs(4))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn banner_expires_after_ttl() {
        let notifier = Notifier::new(Duration::from_secs(4));
        notifier.success("Child added");
        assert_eq!(notifier.current().unwrap().kind, NotificationKind::Success);
        tokio::time::advance(Duration::from_millis(3_900)).await;
        assert!(notifier.current().is_some());
        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(notifier.current().is_none());
    }

    #[tokio::test]
    async fn newer_banner_replaces_older_and_all_are_broadcast() {
        let notifier = Notifier::default();
        let mut rx = notifier.subscribe();
        notifier.error("offline");
        notifier.info("Child removed");
        assert_eq!(notifier.current().unwrap().message, "Child removed");
        assert_eq!(rx.recv().await.unwrap().kind, NotificationKind::Error);
        assert_eq!(rx.recv().await.unwrap().kind, NotificationKind::Info);
    }

    #[tokio::test]
    async fn dismiss_clears_banner() {
        let notifier = Notifier::default();
        notifier.info("hello");
        notifier.dismiss();
        assert!(notifier.current().is_none());
    }
}
