//! Encrypted local cache.
//!
//! Values are serialized to JSON, sealed with ChaCha20-Poly1305 under a
//! key derived from the configured secret, and stored as
//! `base64(nonce || ciphertext)` in a [`KvNamespace`].
//!
//! A value that cannot be decoded, authenticated or parsed reads back as
//! a miss. A corrupt cache means "start fresh", never a crash.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;
use tracing::{debug, warn};

use super::database::KvNamespace;
use crate::error::{ConfigError, StoreError};

const NONCE_LEN: usize = 12;
const KDF_SALT: &[u8] = b"starstudy/local-cache";
const KDF_INFO: &[u8] = b"chacha20poly1305 v1";

/// Symmetric encrypt/decrypt wrapper around a key-value namespace.
pub struct EncryptedStore {
    kv: Box<dyn KvNamespace>,
    cipher: ChaCha20Poly1305,
}

impl std::fmt::Debug for EncryptedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedStore").finish_non_exhaustive()
    }
}

impl EncryptedStore {
    /// Wrap `kv`, deriving the cipher key from `secret`.
    ///
    /// # Errors
    /// An empty secret is refused; there is no built-in fallback key.
    pub fn new(kv: Box<dyn KvNamespace>, secret: &str) -> Result<Self, ConfigError> {
        if secret.trim().is_empty() {
            return Err(ConfigError::MissingKey("storage.secret".into()));
        }
        let hk = Hkdf::<Sha256>::new(Some(KDF_SALT), secret.as_bytes());
        let mut key = [0u8; 32];
        hk.expand(KDF_INFO, &mut key)
            .map_err(|e| ConfigError::InvalidValue {
                key: "storage.secret".into(),
                message: e.to_string(),
            })?;
        Ok(Self {
            kv,
            cipher: ChaCha20Poly1305::new(Key::from_slice(&key)),
        })
    }

    /// Serialize, encrypt and store `value` under `key`, replacing any
    /// previous value.
    pub fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let plain = serde_json::to_vec(value).map_err(|source| StoreError::Serialize {
            key: key.to_string(),
            source,
        })?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plain.as_ref())
            .map_err(|e| StoreError::Encryption(e.to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + sealed.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&sealed);
        self.kv.put(key, &STANDARD.encode(blob))?;
        debug!(key, bytes = plain.len(), "cache write");
        Ok(())
    }

    /// Read back the value stored under `key`.
    ///
    /// Returns `Ok(None)` when the key is absent *or* when the stored
    /// text is corrupt, was sealed under another secret, or does not
    /// parse as `T`. Only a failure of the underlying namespace is an
    /// error.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(encoded) = self.kv.get(key)? else {
            return Ok(None);
        };
        match self.open(&encoded) {
            Some(value) => Ok(Some(value)),
            None => {
                warn!(key, "discarding unreadable cache entry");
                Ok(None)
            }
        }
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.kv.delete(key)
    }

    /// Direct access to the stored (encrypted) text.
    pub fn raw(&self) -> &dyn KvNamespace {
        self.kv.as_ref()
    }

    fn open<T: DeserializeOwned>(&self, encoded: &str) -> Option<T> {
        let blob = STANDARD.decode(encoded.trim()).ok()?;
        if blob.len() <= NONCE_LEN {
            return None;
        }
        let (nonce, sealed) = blob.split_at(NONCE_LEN);
        let plain = self.cipher.decrypt(Nonce::from_slice(nonce), sealed).ok()?;
        serde_json::from_slice(&plain).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKv;
    use std::collections::BTreeMap;

    fn store(secret: &str) -> EncryptedStore {
        EncryptedStore::new(Box::new(MemoryKv::new()), secret).unwrap()
    }

    #[test]
    fn put_then_get_returns_value() {
        let store = store("s3cret");
        let mut value = BTreeMap::new();
        value.insert("stars".to_string(), vec![1u32, 2, 3]);
        store.put("k", &value).unwrap();
        let back: BTreeMap<String, Vec<u32>> = store.get("k").unwrap().unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn stored_text_is_not_plaintext() {
        let store = store("s3cret");
        store.put("k", "hello world").unwrap();
        let raw = store.raw().get("k").unwrap().unwrap();
        assert!(!raw.contains("hello"));
    }

    #[test]
    fn missing_key_is_none() {
        let store = store("s3cret");
        assert!(store.get::<String>("never").unwrap().is_none());
    }

    #[test]
    fn every_flipped_byte_reads_as_miss() {
        let store = store("s3cret");
        store.put("k", &vec!["a", "b"]).unwrap();
        let original = STANDARD.decode(store.raw().get("k").unwrap().unwrap()).unwrap();
        for i in 0..original.len() {
            let mut tampered = original.clone();
            tampered[i] ^= 0x01;
            store.raw().put("k", &STANDARD.encode(&tampered)).unwrap();
            assert!(store.get::<Vec<String>>("k").unwrap().is_none(), "byte {i}");
        }
    }

    #[test]
    fn garbage_text_reads_as_miss() {
        let store = store("s3cret");
        store.raw().put("k", "not base64 at all!").unwrap();
        assert!(store.get::<String>("k").unwrap().is_none());
        store.raw().put("k", "").unwrap();
        assert!(store.get::<String>("k").unwrap().is_none());
    }

    #[test]
    fn wrong_secret_reads_as_miss() {
        let kv = MemoryKv::new();
        let writer = EncryptedStore::new(Box::new(MemoryKv::new()), "one").unwrap();
        writer.put("k", &42u32).unwrap();
        let cipher_text = writer.raw().get("k").unwrap().unwrap();
        kv.put("k", &cipher_text).unwrap();
        let reader = EncryptedStore::new(Box::new(kv), "two").unwrap();
        assert!(reader.get::<u32>("k").unwrap().is_none());
    }

    #[test]
    fn wrong_shape_reads_as_miss() {
        let store = store("s3cret");
        store.put("k", "text").unwrap();
        assert!(store.get::<Vec<u32>>("k").unwrap().is_none());
    }

    #[test]
    fn empty_secret_is_refused() {
        let err = EncryptedStore::new(Box::new(MemoryKv::new()), "  ").unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey(_)));
    }
}
