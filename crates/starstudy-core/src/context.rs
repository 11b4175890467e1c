//! Collaborators shared by every operation.
//!
//! Built once at startup and handed to the sync coordinator, which owns
//! it; account flows borrow it from there.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::auth::{AuthProvider, HttpAuthProvider, OfflineAuthProvider};
use crate::error::CoreError;
use crate::notify::Notifier;
use crate::remote::{DocumentStore, Endpoint, HttpDocumentStore, OfflineDocumentStore};
use crate::storage::{Config, EncryptedStore, KvNamespace};

/// Default local cache key for the roster.
pub const DEFAULT_ROSTER_KEY: &str = "children";

pub struct AppContext {
    pub remote: Arc<dyn DocumentStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub local: EncryptedStore,
    pub notifier: Notifier,
    pub roster_key: String,
    pub tick_interval: Duration,
}

impl AppContext {
    pub fn new(remote: Arc<dyn DocumentStore>, auth: Arc<dyn AuthProvider>, local: EncryptedStore) -> Self {
        Self {
            remote,
            auth,
            local,
            notifier: Notifier::default(),
            roster_key: DEFAULT_ROSTER_KEY.to_string(),
            tick_interval: Duration::from_secs(1),
        }
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_roster_key(mut self, key: impl Into<String>) -> Self {
        self.roster_key = key.into();
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Wire collaborators from configuration.
    ///
    /// Without a remote endpoint both the document store and the auth
    /// provider run offline: every remote call reports unavailable and
    /// the app works from the local cache alone.
    ///
    /// # Errors
    /// Fails when no storage secret is configured or the endpoint is
    /// not a valid URL.
    pub fn from_config(config: &Config, kv: Box<dyn KvNamespace>) -> Result<Self, CoreError> {
        let secret = config.storage_secret()?;
        let local = EncryptedStore::new(kv, &secret)?;

        let (remote, auth): (Arc<dyn DocumentStore>, Arc<dyn AuthProvider>) = match config.remote_endpoint() {
            Some(url) => {
                let endpoint = Endpoint::new(&url, config.remote_api_key(), config.remote_timeout())?;
                info!(endpoint = %url, "using hosted remote");
                (
                    Arc::new(HttpDocumentStore::new(endpoint.clone())),
                    Arc::new(HttpAuthProvider::new(endpoint)),
                )
            }
            None => {
                info!("no remote endpoint configured, running local-only");
                (Arc::new(OfflineDocumentStore), Arc::new(OfflineAuthProvider::new()))
            }
        };

        Ok(Self::new(remote, auth, local)
            .with_notifier(Notifier::new(config.notification_ttl()))
            .with_roster_key(config.storage.roster_key.clone())
            .with_tick_interval(config.tick_interval()))
    }
}
