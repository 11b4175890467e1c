//! Shared fixtures: an app wired to in-memory collaborators.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use starstudy_core::auth::MemoryAuthProvider;
use starstudy_core::remote::MemoryDocumentStore;
use starstudy_core::storage::{EncryptedStore, MemoryKv};
use starstudy_core::{AppContext, Principal};

pub const SECRET: &str = "integration-secret";

pub struct Fixture {
    pub remote: Arc<MemoryDocumentStore>,
    pub auth: Arc<MemoryAuthProvider>,
}

pub fn context() -> (AppContext, Fixture) {
    context_with(EncryptedStore::new(Box::new(MemoryKv::new()), SECRET).unwrap())
}

pub fn context_with(local: EncryptedStore) -> (AppContext, Fixture) {
    let remote = Arc::new(MemoryDocumentStore::new());
    let auth = Arc::new(MemoryAuthProvider::new());
    let ctx = AppContext::new(remote.clone(), auth.clone(), local).with_tick_interval(Duration::from_secs(1));
    (ctx, Fixture { remote, auth })
}

pub fn durable(path: &std::path::Path, secret: &str) -> EncryptedStore {
    let db = starstudy_core::Database::open_at(path).unwrap();
    EncryptedStore::new(Box::new(db), secret).unwrap()
}

pub fn principal(uid: &str) -> Principal {
    Principal {
        uid: uid.to_string(),
        email: format!("{uid}@test.com"),
        email_verified: true,
    }
}
