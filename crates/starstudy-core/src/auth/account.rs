//! Sign-up and sign-in flows on top of an [`AuthProvider`].
//!
//! [`AuthProvider`]: super::AuthProvider

use chrono::Utc;
use tracing::{info, warn};

use super::{is_plausible_email, Principal};
use crate::context::AppContext;
use crate::error::{AuthError, CoreError, RemoteError, ValidationError};
use crate::remote::decode_records;
use crate::roster::{sanitize, Parent, PARENTS_COLLECTION};

#[derive(Debug, Clone, Default)]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm: String,
}

impl SignUpForm {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.password != self.confirm {
            return Err(ValidationError::PasswordMismatch);
        }
        if !is_plausible_email(self.email.trim()) {
            return Err(ValidationError::InvalidValue {
                field: "email".into(),
                message: "not a valid email address".into(),
            });
        }
        Ok(())
    }
}

/// Create an account and its parent record. A blank name falls back
/// to the email address.
///
/// The principal is not signed in afterwards; the user has to verify
/// their email first. A failure to write the parent record is logged
/// and otherwise ignored; [`resolve_parent`] synthesizes one later.
pub async fn sign_up(ctx: &AppContext, form: &SignUpForm) -> Result<Parent, CoreError> {
    form.validate()?;
    let principal = ctx.auth.sign_up(form.email.trim(), &form.password).await?;

    let name = sanitize(form.name.trim());
    let parent = Parent {
        id: principal.uid.clone(),
        name: if name.is_empty() { principal.email.clone() } else { name },
        email: principal.email.clone(),
        created_at: Utc::now(),
    };
    let record = serde_json::to_value(&parent)?;
    if let Err(e) = ctx
        .remote
        .save(PARENTS_COLLECTION, Some(&parent.id), Some(&parent.id), record)
        .await
    {
        warn!(uid = %parent.id, error = %e, "parent record not saved");
    }

    ctx.notifier
        .success("Account created. Check your inbox to verify your email, then sign in.");
    Ok(parent)
}

/// Sign in, refusing principals whose email is not verified.
///
/// An unverified principal is signed straight back out and the call
/// fails with [`AuthError::NotVerified`].
pub async fn sign_in(ctx: &AppContext, email: &str, password: &str) -> Result<Principal, CoreError> {
    let principal = ctx.auth.sign_in(email.trim(), password).await?;
    if !principal.email_verified {
        ctx.auth.sign_out().await?;
        info!(uid = %principal.uid, "sign-in refused, email not verified");
        return Err(AuthError::NotVerified.into());
    }
    info!(uid = %principal.uid, "signed in");
    Ok(principal)
}

/// Look up the parent record for `principal`, defaulting the name to
/// the email address when none exists.
pub async fn resolve_parent(ctx: &AppContext, principal: &Principal) -> Result<Parent, RemoteError> {
    let records = ctx
        .remote
        .query(PARENTS_COLLECTION, Some(&principal.uid))
        .await?;
    let found = decode_records::<Parent>(records)
        .into_iter()
        .find(|p| p.id == principal.uid);
    Ok(found.unwrap_or_else(|| default_parent(principal)))
}

/// Parent derived from the principal alone.
pub fn default_parent(principal: &Principal) -> Parent {
    Parent {
        id: principal.uid.clone(),
        name: principal.email.clone(),
        email: principal.email.clone(),
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthProvider, MemoryAuthProvider};
    use crate::remote::MemoryDocumentStore;
    use crate::storage::{EncryptedStore, MemoryKv};
    use std::sync::Arc;

    fn context() -> (AppContext, Arc<MemoryAuthProvider>, Arc<MemoryDocumentStore>) {
        let auth = Arc::new(MemoryAuthProvider::new());
        let remote = Arc::new(MemoryDocumentStore::new());
        let local = EncryptedStore::new(Box::new(MemoryKv::new()), "test-secret").unwrap();
        let ctx = AppContext::new(remote.clone(), auth.clone(), local);
        (ctx, auth, remote)
    }

    fn form() -> SignUpForm {
        SignUpForm {
            name: "Amal".into(),
            email: "a@test.com".into(),
            password: "Passw0rd!".into(),
            confirm: "Passw0rd!".into(),
        }
    }

    #[tokio::test]
    async fn sign_up_then_unverified_sign_in_is_refused() {
        let (ctx, auth, remote) = context();
        let parent = sign_up(&ctx, &form()).await.unwrap();
        assert_eq!(auth.sent_verifications(), vec!["a@test.com".to_string()]);
        assert_eq!(remote.record(PARENTS_COLLECTION, &parent.id).unwrap()["name"], "Amal");

        let err = sign_in(&ctx, "a@test.com", "Passw0rd!").await.unwrap_err();
        assert!(matches!(err, CoreError::Auth(AuthError::NotVerified)));
        assert!(auth.current().is_none());

        auth.verify_email("a@test.com");
        let principal = sign_in(&ctx, "a@test.com", "Passw0rd!").await.unwrap();
        assert_eq!(principal.uid, parent.id);
    }

    #[tokio::test]
    async fn mismatched_passwords_never_reach_the_provider() {
        let (ctx, auth, _) = context();
        let mut form = form();
        form.confirm = "other".into();
        let err = sign_up(&ctx, &form).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::PasswordMismatch)));
        assert!(auth.sent_verifications().is_empty());
    }

    #[tokio::test]
    async fn sign_up_survives_parent_write_failure() {
        let (ctx, _, remote) = context();
        remote.set_reject_writes(true);
        assert!(sign_up(&ctx, &form()).await.is_ok());
        assert_eq!(remote.len(PARENTS_COLLECTION), 0);
    }

    #[tokio::test]
    async fn resolve_parent_defaults_name_to_email() {
        let (ctx, _, _) = context();
        let principal = Principal {
            uid: "u1".into(),
            email: "b@test.com".into(),
            email_verified: true,
        };
        let parent = resolve_parent(&ctx, &principal).await.unwrap();
        assert_eq!(parent.name, "b@test.com");
        assert_eq!(parent.display_name(), "b@test.com");
    }
}
