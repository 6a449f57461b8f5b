//! Evaluation result cache
//!
//! Entries are keyed by a 64-bit fingerprint of every context attribute a
//! rule condition can read except the timestamp. Results that depend on
//! time are never inserted (see `PolicyResolver::evaluate`). Eviction drops the oldest-inserted entry when
//! the cache is full; reads do not refresh an entry, so this is a FIFO
//! bound rather than true LRU.

use crate::anonymization::models::{EvaluationContext, PolicyEvaluationResult, PolicyScope};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Default entry lifetime
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default maximum number of entries
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Stable fingerprint of an evaluation context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey(u64);

impl CacheKey {
    /// Fingerprint `(user, role, org, team, classification, field, location,
    /// purpose, sorted pii types, metadata)`
    pub fn for_context(ctx: &EvaluationContext) -> Self {
        let mut pii_types: Vec<String> = ctx.pii_types.iter().map(|p| p.to_lowercase()).collect();
        pii_types.sort();
        pii_types.dedup();

        let parts = [
            ctx.user_id.as_str(),
            ctx.role.as_str(),
            ctx.organization_id.as_deref().unwrap_or(""),
            ctx.team_id.as_deref().unwrap_or(""),
            ctx.data_classification.as_deref().unwrap_or(""),
            ctx.field.as_str(),
            ctx.location.as_deref().unwrap_or(""),
            ctx.purpose.as_deref().unwrap_or(""),
        ];

        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_bytes());
            hasher.update([0x1f]);
        }
        hasher.update(pii_types.join("\u{1f}").as_bytes());
        hasher.update([0x1e]);
        // BTreeMap iteration is already key-ordered
        for (key, value) in &ctx.metadata {
            hasher.update(key.as_bytes());
            hasher.update([0x1f]);
            hasher.update(value.to_string().as_bytes());
            hasher.update([0x1e]);
        }
        let digest = hasher.finalize();

        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        Self(u64::from_be_bytes(prefix))
    }
}

/// Requester attributes kept alongside an entry for scope invalidation
#[derive(Debug, Clone)]
struct Requester {
    user_id: String,
    organization_id: Option<String>,
    team_id: Option<String>,
}

impl Requester {
    fn in_scope(&self, scope: PolicyScope, scope_id: Option<&str>) -> bool {
        match scope {
            PolicyScope::Global => true,
            PolicyScope::Organization => self.organization_id.as_deref() == scope_id,
            PolicyScope::Team => self.team_id.as_deref() == scope_id,
            PolicyScope::User => Some(self.user_id.as_str()) == scope_id,
        }
    }
}

struct CacheEntry {
    result: PolicyEvaluationResult,
    requester: Requester,
    inserted_at: Instant,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    order: VecDeque<CacheKey>,
}

/// Bounded, TTL-limited cache of resolver outcomes
pub struct EvaluationCache {
    state: Mutex<CacheState>,
    ttl: Duration,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EvaluationCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            ttl,
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cached result for `ctx`, if present and not expired
    pub fn get(&self, ctx: &EvaluationContext) -> Option<PolicyEvaluationResult> {
        let key = CacheKey::for_context(ctx);
        let mut state = self.state.lock();

        let expired = match state.entries.get(&key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.result.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            state.entries.remove(&key);
            state.order.retain(|k| *k != key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a result, evicting the oldest entries beyond capacity
    pub fn insert(&self, ctx: &EvaluationContext, result: PolicyEvaluationResult) {
        let key = CacheKey::for_context(ctx);
        let entry = CacheEntry {
            result,
            requester: Requester {
                user_id: ctx.user_id.clone(),
                organization_id: ctx.organization_id.clone(),
                team_id: ctx.team_id.clone(),
            },
            inserted_at: Instant::now(),
        };

        let mut state = self.state.lock();
        if state.entries.insert(key, entry).is_some() {
            state.order.retain(|k| *k != key);
        }
        state.order.push_back(key);

        while state.entries.len() > self.capacity {
            match state.order.pop_front() {
                Some(oldest) => {
                    state.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    /// Drop every entry
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.order.clear();
    }

    /// Drop entries whose requester falls within `scope`/`scope_id`
    pub fn invalidate_scope(&self, scope: PolicyScope, scope_id: Option<&str>) -> usize {
        let mut state = self.state.lock();
        let before = state.entries.len();
        state
            .entries
            .retain(|_, entry| !entry.requester.in_scope(scope, scope_id));
        let CacheState { entries, order } = &mut *state;
        order.retain(|k| entries.contains_key(k));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Hits over total lookups; 0 before the first lookup
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

impl Default for EvaluationCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL, DEFAULT_CACHE_CAPACITY)
    }
}
