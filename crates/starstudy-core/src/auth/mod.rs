//! Authentication collaborator.
//!
//! Credential checks live behind [`AuthProvider`]; this crate only
//! consumes principals. Principal changes are published on a
//! `tokio::sync::watch` channel whose receiver always holds the current
//! principal, so a fresh subscriber sees the startup state immediately.

pub mod account;
pub mod http;
pub mod memory;

pub use account::{resolve_parent, sign_in, sign_up, SignUpForm};
pub use http::HttpAuthProvider;
pub use memory::MemoryAuthProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{AuthError, RemoteError};

/// Minimum password length accepted at sign-up.
pub const MIN_PASSWORD_LEN: usize = 6;

/// An authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub uid: String,
    pub email: String,
    pub email_verified: bool,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Create an account. Sends a verification challenge as a side
    /// effect; the new principal is not signed in.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Principal, AuthError>;

    /// Check credentials and make the principal current, verified or not.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    fn current(&self) -> Option<Principal>;

    /// Receiver for principal changes, primed with the current value.
    fn subscribe(&self) -> watch::Receiver<Option<Principal>>;

    /// Reinstate a principal remembered from an earlier run.
    fn restore(&self, principal: Principal);
}

/// Provider used when no remote endpoint is configured.
#[derive(Debug)]
pub struct OfflineAuthProvider {
    principal: watch::Sender<Option<Principal>>,
}

impl OfflineAuthProvider {
    pub fn new() -> Self {
        Self {
            principal: watch::Sender::new(None),
        }
    }
}

impl Default for OfflineAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn not_configured() -> AuthError {
    AuthError::Remote(RemoteError::Unavailable("auth service not initialized".into()))
}

#[async_trait]
impl AuthProvider for OfflineAuthProvider {
    async fn sign_up(&self, _email: &str, _password: &str) -> Result<Principal, AuthError> {
        Err(not_configured())
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> Result<Principal, AuthError> {
        Err(not_configured())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.principal.send_replace(None);
        Ok(())
    }

    fn current(&self) -> Option<Principal> {
        self.principal.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Principal>> {
        self.principal.subscribe()
    }

    fn restore(&self, principal: Principal) {
        self.principal.send_replace(Some(principal));
    }
}

/// Loose syntactic check: one `@` with text on both sides and a dot in
/// the domain.
pub fn is_plausible_email(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_check() {
        assert!(is_plausible_email("a@test.com"));
        assert!(!is_plausible_email("a@test"));
        assert!(!is_plausible_email("@test.com"));
        assert!(!is_plausible_email("a@@test.com"));
        assert!(!is_plausible_email("a b@test.com"));
    }

    #[tokio::test]
    async fn offline_provider_refuses_credentials_but_can_restore() {
        let auth = OfflineAuthProvider::new();
        assert!(matches!(
            auth.sign_in("a@test.com", "Passw0rd!").await,
            Err(AuthError::Remote(_))
        ));
        let rx = auth.subscribe();
        auth.restore(Principal {
            uid: "u1".into(),
            email: "a@test.com".into(),
            email_verified: true,
        });
        assert_eq!(rx.borrow().as_ref().map(|p| p.uid.as_str()), Some("u1"));
        auth.sign_out().await.unwrap();
        assert!(auth.current().is_none());
    }
}
