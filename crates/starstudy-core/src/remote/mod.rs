//! Remote document collaborator.
//!
//! The remote store is a multi-tenant set of JSON collections. Every
//! call may fail with [`RemoteError`]; callers in [`crate::sync`] treat
//! that as "continue locally", never as fatal.

pub mod http;
pub mod memory;

pub use http::{Endpoint, HttpDocumentStore};
pub use memory::MemoryDocumentStore;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RemoteError;

/// Field stamped on every saved record with the owning principal's uid.
pub const OWNER_FIELD: &str = "owner_id";

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create (`id == None`, the store picks the id) or merge-update a
    /// record. The owner, when given, is written into [`OWNER_FIELD`].
    /// Returns the record id.
    async fn save(
        &self,
        collection: &str,
        id: Option<&str>,
        owner: Option<&str>,
        record: Value,
    ) -> Result<String, RemoteError>;

    /// All records in `collection`, restricted to `owner` when given.
    async fn query(&self, collection: &str, owner: Option<&str>) -> Result<Vec<Value>, RemoteError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError>;
}

/// Stand-in used when no remote endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineDocumentStore;

const NOT_CONFIGURED: &str = "remote store not initialized";

#[async_trait]
impl DocumentStore for OfflineDocumentStore {
    async fn save(
        &self,
        _collection: &str,
        _id: Option<&str>,
        _owner: Option<&str>,
        _record: Value,
    ) -> Result<String, RemoteError> {
        Err(RemoteError::Unavailable(NOT_CONFIGURED.into()))
    }

    async fn query(&self, _collection: &str, _owner: Option<&str>) -> Result<Vec<Value>, RemoteError> {
        Err(RemoteError::Unavailable(NOT_CONFIGURED.into()))
    }

    async fn delete(&self, _collection: &str, _id: &str) -> Result<(), RemoteError> {
        Err(RemoteError::Unavailable(NOT_CONFIGURED.into()))
    }
}

/// Decode query results, skipping records that do not fit `T`.
pub fn decode_records<T: serde::de::DeserializeOwned>(records: Vec<Value>) -> Vec<T> {
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value(record) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed remote record");
                None
            }
        })
        .collect()
}
