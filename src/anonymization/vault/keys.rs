//! Key provider abstraction
//!
//! The engine never embeds key material in results; it asks a
//! [`KeyProvider`] for a key by logical id on every encryption and
//! decryption. Remote providers should be wrapped in
//! [`TimeoutKeyProvider`] so a slow backend surfaces as a hard error.

use crate::config::{KeyConfig, SecretString};
use crate::domain::errors::KeyProviderError;
use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, Secret, SecretVec};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Required key length for AES-256
pub const KEY_LEN: usize = 32;

/// Opaque key material, zeroized on drop and redacted in Debug output
pub struct KeyMaterial {
    bytes: SecretVec<u8>,
}

impl KeyMaterial {
    /// Wrap raw bytes; must be exactly [`KEY_LEN`] bytes
    pub fn from_bytes(key_id: &str, bytes: Vec<u8>) -> Result<Self, KeyProviderError> {
        if bytes.len() != KEY_LEN {
            return Err(KeyProviderError::InvalidKey(key_id.to_string()));
        }
        Ok(Self {
            bytes: Secret::new(bytes),
        })
    }

    /// Decode hex-encoded key material
    pub fn from_hex(key_id: &str, encoded: &SecretString) -> Result<Self, KeyProviderError> {
        let bytes = hex::decode(encoded.expose_secret().as_ref().trim())
            .map_err(|_| KeyProviderError::InvalidKey(key_id.to_string()))?;
        Self::from_bytes(key_id, bytes)
    }

    /// Fresh random key from the OS generator
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self {
            bytes: Secret::new(bytes),
        }
    }

    /// Access the raw bytes
    pub fn expose(&self) -> &[u8] {
        self.bytes.expose_secret()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial([REDACTED])")
    }
}

/// Supplies key material by logical key id
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// Fetch the key registered under `key_id`
    async fn get_key(&self, key_id: &str) -> Result<Arc<KeyMaterial>, KeyProviderError>;
}

/// In-memory provider backed by configured keys
#[derive(Debug, Default)]
pub struct StaticKeyProvider {
    keys: HashMap<String, Arc<KeyMaterial>>,
}

impl StaticKeyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configuration entries
    pub fn from_config(keys: &[KeyConfig]) -> Result<Self, KeyProviderError> {
        let mut provider = Self::new();
        for key in keys {
            let material = KeyMaterial::from_hex(&key.id, &key.material)?;
            provider.insert(key.id.clone(), material);
        }
        Ok(provider)
    }

    /// Register (or replace) a key
    pub fn insert(&mut self, key_id: impl Into<String>, material: KeyMaterial) {
        self.keys.insert(key_id.into(), Arc::new(material));
    }

    /// Builder-style registration
    pub fn with_key(mut self, key_id: impl Into<String>, material: KeyMaterial) -> Self {
        self.insert(key_id, material);
        self
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[async_trait]
impl KeyProvider for StaticKeyProvider {
    async fn get_key(&self, key_id: &str) -> Result<Arc<KeyMaterial>, KeyProviderError> {
        self.keys
            .get(key_id)
            .cloned()
            .ok_or_else(|| KeyProviderError::KeyNotFound(key_id.to_string()))
    }
}

/// Bounds every key retrieval of an inner provider
pub struct TimeoutKeyProvider {
    inner: Arc<dyn KeyProvider>,
    timeout: Duration,
}

impl TimeoutKeyProvider {
    pub fn new(inner: Arc<dyn KeyProvider>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl KeyProvider for TimeoutKeyProvider {
    async fn get_key(&self, key_id: &str) -> Result<Arc<KeyMaterial>, KeyProviderError> {
        match tokio::time::timeout(self.timeout, self.inner.get_key(key_id)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    key_id = %key_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Key retrieval timed out"
                );
                Err(KeyProviderError::Timeout {
                    key_id: key_id.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        }
    }
}
