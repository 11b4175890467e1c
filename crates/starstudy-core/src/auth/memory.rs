//! In-process account directory.
//!
//! Passwords are kept as salted SHA-256 digests. Verification mails are
//! recorded in an outbox; [`MemoryAuthProvider::verify_email`] plays the
//! part of the user clicking the link.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tracing::info;

use super::{is_plausible_email, AuthProvider, Principal, MIN_PASSWORD_LEN};
use crate::error::{AuthError, RemoteError};
use crate::roster::generate_id;

#[derive(Debug, Clone)]
struct Account {
    uid: String,
    email: String,
    salt: String,
    password_hash: String,
    verified: bool,
}

impl Account {
    fn principal(&self) -> Principal {
        Principal {
            uid: self.uid.clone(),
            email: self.email.clone(),
            email_verified: self.verified,
        }
    }
}

#[derive(Debug)]
pub struct MemoryAuthProvider {
    accounts: Mutex<HashMap<String, Account>>,
    outbox: Mutex<Vec<String>>,
    principal: watch::Sender<Option<Principal>>,
    offline: AtomicBool,
}

impl MemoryAuthProvider {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            outbox: Mutex::new(Vec::new()),
            principal: watch::Sender::new(None),
            offline: AtomicBool::new(false),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    /// Mark the account's email as verified. Returns false for an
    /// unknown address.
    pub fn verify_email(&self, email: &str) -> bool {
        let mut accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
        match accounts.get_mut(&normalize(email)) {
            Some(account) => {
                account.verified = true;
                true
            }
            None => false,
        }
    }

    /// Addresses a verification challenge was sent to, oldest first.
    pub fn sent_verifications(&self) -> Vec<String> {
        self.outbox.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn check_online(&self) -> Result<(), AuthError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("auth service unreachable".into()).into());
        }
        Ok(())
    }
}

impl Default for MemoryAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl AuthProvider for MemoryAuthProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        self.check_online()?;
        let key = normalize(email);
        if !is_plausible_email(&key) {
            return Err(AuthError::InvalidCredentials);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword {
                min: MIN_PASSWORD_LEN,
            });
        }

        let mut accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
        if accounts.contains_key(&key) {
            return Err(AuthError::EmailInUse(key));
        }
        let mut salt = [0u8; 16];
        OsRng.fill_bytes(&mut salt);
        let salt = hex::encode(salt);
        let account = Account {
            uid: generate_id(),
            email: key.clone(),
            password_hash: digest(&salt, password),
            salt,
            verified: false,
        };
        let principal = account.principal();
        accounts.insert(key.clone(), account);
        drop(accounts);

        self.outbox
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(key);
        info!(uid = %principal.uid, "account created, verification sent");
        Ok(principal)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        self.check_online()?;
        let principal = {
            let accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
            let account = accounts
                .get(&normalize(email))
                .ok_or(AuthError::InvalidCredentials)?;
            if digest(&account.salt, password) != account.password_hash {
                return Err(AuthError::InvalidCredentials);
            }
            account.principal()
        };
        self.principal.send_replace(Some(principal.clone()));
        Ok(principal)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_up_sends_verification_and_stays_signed_out() {
        let auth = MemoryAuthProvider::new();
        let p = auth.sign_up("A@Test.com", "Passw0rd!").await.unwrap();
        assert_eq!(p.email, "a@test.com");
        assert!(!p.email_verified);
        assert_eq!(auth.sent_verifications(), vec!["a@test.com".to_string()]);
        assert!(auth.current().is_none());
    }

    #[tokio::test]
    async fn sign_in_checks_password_and_reports_verification() {
        let auth = MemoryAuthProvider::new();
        auth.sign_up("a@test.com", "Passw0rd!").await.unwrap();
        assert_eq!(
            auth.sign_in("a@test.com", "wrong").await,
            Err(AuthError::InvalidCredentials)
        );
        let p = auth.sign_in("a@test.com", "Passw0rd!").await.unwrap();
        assert!(!p.email_verified);
        assert!(auth.verify_email("a@test.com"));
        let p = auth.sign_in("a@test.com", "Passw0rd!").await.unwrap();
        assert!(p.email_verified);
        assert_eq!(auth.current(), Some(p));
    }

    #[tokio::test]
    async fn duplicate_and_weak_sign_ups_fail() {
        let auth = MemoryAuthProvider::new();
        auth.sign_up("a@test.com", "Passw0rd!").await.unwrap();
        assert!(matches!(
            auth.sign_up("a@test.com", "Passw0rd!").await,
            Err(AuthError::EmailInUse(_))
        ));
        assert_eq!(
            auth.sign_up("b@test.com", "123").await,
            Err(AuthError::WeakPassword { min: MIN_PASSWORD_LEN })
        );
    }

    #[tokio::test]
    async fn subscribers_observe_changes() {
        let auth = MemoryAuthProvider::new();
        let mut rx = auth.subscribe();
        assert!(rx.borrow_and_update().is_none());
        auth.sign_up("a@test.com", "Passw0rd!").await.unwrap();
        auth.sign_in("a@test.com", "Passw0rd!").await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_some());
        auth.sign_out().await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
    }

    #[tokio::test]
    async fn offline_provider_is_unavailable() {
        let auth = MemoryAuthProvider::new();
        auth.set_available(false);
        assert!(matches!(
            auth.sign_up("a@test.com", "Passw0rd!").await,
            Err(AuthError::Remote(RemoteError::Unavailable(_)))
        ));
    }
}
