//! Hosted authentication client.
//!
//! ```text
//! POST /v1/auth/sign-up   {"email", "password"} -> principal
//! POST /v1/auth/sign-in   {"email", "password"} -> principal
//! ```
//!
//! The service sends the verification mail itself. Sign-out is local:
//! the principal is simply forgotten.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use super::{AuthProvider, Principal, MIN_PASSWORD_LEN};
use crate::error::{AuthError, RemoteError};
use crate::remote::Endpoint;

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

pub struct HttpAuthProvider {
    endpoint: Endpoint,
    principal: watch::Sender<Option<Principal>>,
}

impl HttpAuthProvider {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            principal: watch::Sender::new(None),
        }
    }

    async fn post(&self, action: &str, email: &str, password: &str) -> Result<Principal, AuthError> {
        let url = self.endpoint.url(&["auth", action])?;
        let request = self
            .endpoint
            .client()
            .post(url)
            .json(&Credentials { email, password });
        let response = match self.endpoint.send(request).await {
            Ok(response) => response,
            Err(RemoteError::Rejected { status: 409, .. }) => {
                return Err(AuthError::EmailInUse(email.to_string()))
            }
            Err(RemoteError::Rejected {
                status: 400 | 401 | 403 | 404,
                message,
            }) => {
                debug!(action, %message, "credentials refused");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };
        response
            .json::<Principal>()
            .await
            .map_err(|e| RemoteError::Unavailable(format!("bad auth response: {e}")).into())
    }
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword {
                min: MIN_PASSWORD_LEN,
            });
        }
        let principal = self.post("sign-up", email, password).await?;
        info!(uid = %principal.uid, "account created");
        Ok(principal)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        let principal = self.post("sign-in", email, password).await?;
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
