//! Token vault
//!
//! Holds `(namespace, value) -> token` mappings for consistent
//! tokenization and `token -> entry` mappings for reversal. Both maps are
//! LRU-bounded by the configured capacity; an evicted forward mapping means
//! a later request for the same value mints a fresh token.
//!
//! All access goes through one mutex, so lookup-or-mint is a single
//! critical section and a value never gets two live tokens in one
//! namespace.

use crate::domain::errors::TechniqueError;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::num::NonZeroUsize;

/// Attempts before giving up on minting a token that is not already taken
const MAX_MINT_ATTEMPTS: usize = 16;

/// Default number of entries kept per map
pub const DEFAULT_VAULT_CAPACITY: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct VaultKey {
    namespace: String,
    value: String,
}

/// What a token resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultEntry {
    /// Tokenization mapping
    Token { original: String, reversible: bool },
    /// Reversible encryption bundle and the key it was sealed with
    Encrypted { key_id: String },
}

/// Result of a lookup-or-mint call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    /// The token came from an existing mapping
    pub reused: bool,
}

/// Vault occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VaultStats {
    pub forward_entries: usize,
    pub reverse_entries: usize,
    pub capacity: usize,
    pub evictions: u64,
}

struct VaultState {
    forward: LruCache<VaultKey, String>,
    reverse: LruCache<String, VaultEntry>,
    evictions: u64,
}

/// Bidirectional, bounded token store
pub struct TokenVault {
    state: Mutex<VaultState>,
    capacity: NonZeroUsize,
}

impl TokenVault {
    /// Create a vault holding at most `capacity` entries per direction
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(VaultState {
                forward: LruCache::new(capacity),
                reverse: LruCache::new(capacity),
                evictions: 0,
            }),
            capacity,
        }
    }

    /// Return the existing token for `value` or mint one with `mint`
    ///
    /// With `consistent`, an existing mapping in `namespace` is reused.
    /// New tokens are stored in both directions when `consistent` or
    /// `reversible` is requested; `mint` is retried while it returns a
    /// token already mapped to another value.
    pub fn issue<F>(
        &self,
        namespace: &str,
        value: &str,
        consistent: bool,
        reversible: bool,
        mut mint: F,
    ) -> Result<IssuedToken, TechniqueError>
    where
        F: FnMut() -> String,
    {
        let key = VaultKey {
            namespace: namespace.to_string(),
            value: value.to_string(),
        };

        let mut state = self.state.lock();

        if consistent {
            if let Some(token) = state.forward.get(&key).cloned() {
                if reversible {
                    state.mark_reversible(&token, value);
                }
                return Ok(IssuedToken {
                    token,
                    reused: true,
                });
            }
        }

        let mut minted = None;
        for _ in 0..MAX_MINT_ATTEMPTS {
            let candidate = mint();
            if !state.reverse.contains(&candidate) {
                minted = Some(candidate);
                break;
            }
        }
        let token = minted.ok_or_else(|| {
            TechniqueError::TokenGeneration(format!(
                "no unused token after {MAX_MINT_ATTEMPTS} attempts"
            ))
        })?;

        if consistent || reversible {
            state.insert_forward(key, token.clone());
            state.insert_reverse(
                token.clone(),
                VaultEntry::Token {
                    original: value.to_string(),
                    reversible,
                },
            );
        }

        Ok(IssuedToken {
            token,
            reused: false,
        })
    }

    /// Record an encryption bundle as reversible with `key_id`
    pub fn register_encrypted(&self, bundle: &str, key_id: &str) {
        self.state.lock().insert_reverse(
            bundle.to_string(),
            VaultEntry::Encrypted {
                key_id: key_id.to_string(),
            },
        );
    }

    /// Look up what a token resolves to
    pub fn lookup(&self, token: &str) -> Option<VaultEntry> {
        self.state.lock().reverse.get(token).cloned()
    }

    /// Original value of a reversible tokenization mapping
    pub fn reveal(&self, token: &str) -> Option<String> {
        match self.lookup(token) {
            Some(VaultEntry::Token {
                original,
                reversible: true,
            }) => Some(original),
            _ => None,
        }
    }

    /// Current occupancy
    pub fn stats(&self) -> VaultStats {
        let state = self.state.lock();
        VaultStats {
            forward_entries: state.forward.len(),
            reverse_entries: state.reverse.len(),
            capacity: self.capacity.get(),
            evictions: state.evictions,
        }
    }

    /// Number of reversal entries
    pub fn len(&self) -> usize {
        self.state.lock().reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every mapping
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.forward.clear();
        state.reverse.clear();
    }
}

impl Default for TokenVault {
    fn default() -> Self {
        Self::new(DEFAULT_VAULT_CAPACITY)
    }
}

impl VaultState {
    fn insert_forward(&mut self, key: VaultKey, token: String) {
        if let Some((evicted, _)) = self.forward.push(key.clone(), token) {
            if evicted != key {
                self.evictions += 1;
            }
        }
    }

    fn insert_reverse(&mut self, token: String, entry: VaultEntry) {
        if let Some((evicted, _)) = self.reverse.push(token.clone(), entry) {
            if evicted != token {
                self.evictions += 1;
                tracing::debug!(evictions = self.evictions, "Token vault evicted an entry");
            }
        }
    }

    fn mark_reversible(&mut self, token: &str, value: &str) {
        match self.reverse.get_mut(token) {
            Some(VaultEntry::Token { reversible, .. }) => *reversible = true,
            Some(VaultEntry::Encrypted { .. }) => {}
            None => self.insert_reverse(
                token.to_string(),
                VaultEntry::Token {
                    original: value.to_string(),
                    reversible: true,
                },
            ),
        }
    }
}
