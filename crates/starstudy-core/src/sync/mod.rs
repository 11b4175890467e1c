//! Roster synchronization.
//!
//! [`SyncCoordinator`] is the only writer of the roster, the encrypted
//! local cache and the remote collections. Each mutation reports how far
//! it got as an outcome value instead of an error: remote trouble is a
//! [`SyncOutcome::LocalOnly`], not a failure.

mod coordinator;

pub use coordinator::SyncCoordinator;

use crate::error::RemoteError;

/// Why a mutation stopped at the local tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalOnlyReason {
    /// No parent is signed in, so there is no remote owner.
    SignedOut,
    Remote(RemoteError),
}

impl std::fmt::Display for LocalOnlyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocalOnlyReason::SignedOut => f.write_str("not signed in"),
            LocalOnlyReason::Remote(e) => write!(f, "{e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced,
    LocalOnly { reason: LocalOnlyReason },
}

impl SyncOutcome {
    pub fn is_synced(&self) -> bool {
        matches!(self, SyncOutcome::Synced)
    }

    fn from_remote(result: Result<(), RemoteError>) -> Self {
        match result {
            Ok(()) => SyncOutcome::Synced,
            Err(e) => SyncOutcome::LocalOnly {
                reason: LocalOnlyReason::Remote(e),
            },
        }
    }

    /// True when the remote was tried and failed.
    fn remote_failed(&self) -> bool {
        matches!(
            self,
            SyncOutcome::LocalOnly {
                reason: LocalOnlyReason::Remote(_)
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(SyncOutcome),
    NotFound,
    /// The confirmation gate said no. Nothing changed.
    Declined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StarOutcome {
    Awarded { stars: u32, sync: SyncOutcome },
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Roster replaced by the remote copy.
    Loaded { children: usize },
    /// Remote fetch failed; the local roster stays in use.
    LocalOnly { reason: RemoteError },
    SignedOut,
}

/// Gate for destructive actions.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

impl Confirm for bool {
    fn confirm(&self, _prompt: &str) -> bool {
        *self
    }
}
