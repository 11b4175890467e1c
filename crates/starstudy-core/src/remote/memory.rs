//! In-process document store.
//!
//! Behaves like the hosted store, with switches for taking it offline,
//! rejecting writes and adding latency. Used by tests and local demos.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{DocumentStore, OWNER_FIELD};
use crate::error::RemoteError;
use crate::roster::generate_id;

type Collection = BTreeMap<String, Map<String, Value>>;

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<HashMap<String, Collection>>,
    offline: AtomicBool,
    reject_writes: AtomicBool,
    latency_ms: AtomicUsize,
    calls: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing (or regaining) connectivity.
    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    /// Answer writes with a permission-denied style rejection.
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as usize, Ordering::SeqCst);
    }

    /// Number of calls received, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Snapshot of one record.
    pub fn record(&self, collection: &str, id: &str) -> Option<Value> {
        self.lock()
            .get(collection)
            .and_then(|c| c.get(id))
            .map(|m| Value::Object(m.clone()))
    }

    pub fn len(&self, collection: &str) -> usize {
        self.lock().get(collection).map_or(0, |c| c.len())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Collection>> {
        self.collections.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn enter(&self) -> Result<(), RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency as u64)).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("network unreachable".into()));
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<(), RemoteError> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(RemoteError::Rejected {
                status: 403,
                message: "permission denied".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn save(
        &self,
        collection: &str,
        id: Option<&str>,
        owner: Option<&str>,
        record: Value,
    ) -> Result<String, RemoteError> {
        self.enter().await?;
        self.check_writable()?;

        let Value::Object(mut fields) = record else {
            return Err(RemoteError::Rejected {
                status: 400,
                message: "record must be a JSON object".into(),
            });
        };
        let id = id.map(str::to_string).unwrap_or_else(generate_id);
        fields.insert("id".into(), Value::String(id.clone()));
        if let Some(owner) = owner {
            fields.insert(OWNER_FIELD.into(), Value::String(owner.to_string()));
        }

        let mut collections = self.lock();
        let docs = collections.entry(collection.to_string()).or_default();
        // Merge semantics: fields not present in `record` are kept.
        docs.entry(id.clone()).or_default().extend(fields);
        Ok(id)
    }

    async fn query(&self, collection: &str, owner: Option<&str>) -> Result<Vec<Value>, RemoteError> {
        self.enter().await?;
        let collections = self.lock();
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(docs
            .values()
            .filter(|doc| match owner {
                Some(owner) => doc.get(OWNER_FIELD).and_then(Value::as_str) == Some(owner),
                None => true,
            })
            .map(|doc| Value::Object(doc.clone()))
            .collect())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        self.enter().await?;
        self.check_writable()?;
        if let Some(docs) = self.lock().get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn save_create_assigns_id() {
        let store = MemoryDocumentStore::new();
        let id = store.save("parents", None, None, json!({"name": "A"})).await.unwrap();
        assert!(!id.is_empty());
        assert_eq!(store.record("parents", &id).unwrap()["id"], json!(id));
    }

    #[tokio::test]
    async fn save_update_merges_fields() {
        let store = MemoryDocumentStore::new();
        store
            .save("children", Some("c1"), Some("p1"), json!({"name": "A", "stars": 1}))
            .await
            .unwrap();
        store
            .save("children", Some("c1"), Some("p1"), json!({"stars": 2}))
            .await
            .unwrap();
        let doc = store.record("children", "c1").unwrap();
        assert_eq!(doc["name"], "A");
        assert_eq!(doc["stars"], 2);
        assert_eq!(doc[OWNER_FIELD], "p1");
    }

    #[tokio::test]
    async fn query_filters_by_owner() {
        let store = MemoryDocumentStore::new();
        store.save("children", Some("a"), Some("p1"), json!({})).await.unwrap();
        store.save("children", Some("b"), Some("p2"), json!({})).await.unwrap();
        assert_eq!(store.query("children", Some("p1")).await.unwrap().len(), 1);
        assert_eq!(store.query("children", None).await.unwrap().len(), 2);
        assert!(store.query("missing", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn offline_and_rejecting_modes() {
        let store = MemoryDocumentStore::new();
        store.set_available(false);
        assert!(matches!(
            store.query("children", None).await,
            Err(RemoteError::Unavailable(_))
        ));
        store.set_available(true);
        store.set_reject_writes(true);
        assert!(matches!(
            store.delete("children", "a").await,
            Err(RemoteError::Rejected { status: 403, .. })
        ));
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test]
    async fn non_object_record_is_rejected() {
        let store = MemoryDocumentStore::new();
        let err = store.save("children", None, None, json!([1, 2])).await.unwrap_err();
        assert!(matches!(err, RemoteError::Rejected { status: 400, .. }));
    }
}
