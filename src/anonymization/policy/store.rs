//! In-memory versioned policy store
//!
//! Policies are kept per id (latest version only) with a per-scope index
//! ordered by insertion sequence. Every mutation invalidates the attached
//! [`EvaluationCache`] before the write lock is released, and the resolver
//! populates the cache while holding a read lock, so a cached result can
//! never outlive the policy version it was computed from.

use super::cache::EvaluationCache;
use crate::anonymization::config::CacheInvalidation;
use crate::anonymization::models::{
    AnonymizationPolicy, AnonymizationRule, PolicyDraft, PolicyScope, PolicyUpdate, PolicyVersion,
};
use crate::domain::{MasqueradeError, Result};
use chrono::Utc;
use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// A policy plus its insertion sequence (the last tie-breaker)
#[derive(Debug, Clone)]
pub(crate) struct StoredPolicy {
    pub(crate) policy: AnonymizationPolicy,
    pub(crate) sequence: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StoreState {
    policies: HashMap<String, StoredPolicy>,
    scope_index: BTreeMap<PolicyScope, BTreeMap<u64, String>>,
    next_sequence: u64,
}

impl StoreState {
    /// Policies attached to `scope`, in insertion order
    pub(crate) fn in_scope(&self, scope: PolicyScope) -> impl Iterator<Item = &StoredPolicy> {
        self.scope_index
            .get(&scope)
            .into_iter()
            .flat_map(|ids| ids.values())
            .filter_map(|id| self.policies.get(id))
    }

    fn index(&mut self, scope: PolicyScope, sequence: u64, id: &str) {
        self.scope_index
            .entry(scope)
            .or_default()
            .insert(sequence, id.to_string());
    }

    fn unindex(&mut self, scope: PolicyScope, sequence: u64) {
        if let Some(ids) = self.scope_index.get_mut(&scope) {
            ids.remove(&sequence);
        }
    }
}

/// Versioned repository of anonymization policies
pub struct PolicyStore {
    state: RwLock<StoreState>,
    cache: Arc<EvaluationCache>,
    invalidation: CacheInvalidation,
}

impl PolicyStore {
    pub fn new(cache: Arc<EvaluationCache>, invalidation: CacheInvalidation) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            cache,
            invalidation,
        }
    }

    /// The cache this store invalidates on mutation
    pub fn cache(&self) -> &Arc<EvaluationCache> {
        &self.cache
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read()
    }

    /// Validate and insert a new policy at version 1.0
    pub fn create(&self, draft: PolicyDraft, created_by: &str) -> Result<AnonymizationPolicy> {
        let now = Utc::now();
        let id = draft
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let policy = AnonymizationPolicy {
            id,
            name: draft.name,
            version: PolicyVersion::INITIAL,
            scope: draft.scope,
            scope_id: draft.scope_id,
            enabled: draft.enabled,
            priority: draft.priority,
            rules: draft.rules.into_iter().map(assign_rule_id).collect(),
            default_rule: draft.default_rule.map(assign_rule_id),
            data_classifications: draft.data_classifications,
            effective_date: draft.effective_date,
            expiration_date: draft.expiration_date,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: None,
        };
        validate_policy(&policy)?;

        let mut state = self.state.write();
        if state.policies.contains_key(&policy.id) {
            return Err(MasqueradeError::PolicyValidation(format!(
                "policy '{}' already exists",
                policy.id
            )));
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.index(policy.scope, sequence, &policy.id);
        state.policies.insert(
            policy.id.clone(),
            StoredPolicy {
                policy: policy.clone(),
                sequence,
            },
        );
        self.invalidate(&[(policy.scope, policy.scope_id.as_deref())]);

        crate::log_policy_change!("created", policy.id, policy.version, created_by);
        Ok(policy)
    }

    /// Apply a partial update and bump the minor version
    pub fn update(
        &self,
        id: &str,
        update: PolicyUpdate,
        updated_by: &str,
    ) -> Result<AnonymizationPolicy> {
        let mut state = self.state.write();
        let stored = state
            .policies
            .get(id)
            .cloned()
            .ok_or_else(|| MasqueradeError::PolicyNotFound(format!("policy '{id}' does not exist")))?;

        let previous = stored.policy;
        let mut policy = previous.clone();
        apply_update(&mut policy, update);
        policy.version = previous.version.next_minor();
        policy.updated_at = Some(Utc::now());
        validate_policy(&policy)?;

        if policy.scope != previous.scope {
            state.unindex(previous.scope, stored.sequence);
            state.index(policy.scope, stored.sequence, id);
        }
        state.policies.insert(
            id.to_string(),
            StoredPolicy {
                policy: policy.clone(),
                sequence: stored.sequence,
            },
        );
        self.invalidate(&[
            (previous.scope, previous.scope_id.as_deref()),
            (policy.scope, policy.scope_id.as_deref()),
        ]);

        crate::log_policy_change!("updated", policy.id, policy.version, updated_by);
        Ok(policy)
    }

    /// Remove a policy; returns whether it existed
    pub fn delete(&self, id: &str) -> bool {
        let mut state = self.state.write();
        let Some(stored) = state.policies.remove(id) else {
            return false;
        };
        state.unindex(stored.policy.scope, stored.sequence);
        self.invalidate(&[(stored.policy.scope, stored.policy.scope_id.as_deref())]);

        tracing::info!(
            action = "deleted",
            policy_id = %id,
            version = %stored.policy.version,
            "Policy changed"
        );
        true
    }

    pub fn get(&self, id: &str) -> Option<AnonymizationPolicy> {
        self.state.read().policies.get(id).map(|s| s.policy.clone())
    }

    /// All policies in insertion order
    pub fn list(&self) -> Vec<AnonymizationPolicy> {
        let state = self.state.read();
        let mut stored: Vec<&StoredPolicy> = state.policies.values().collect();
        stored.sort_by_key(|s| s.sequence);
        stored.into_iter().map(|s| s.policy.clone()).collect()
    }

    /// Number of policies attached to each scope
    pub fn counts_by_scope(&self) -> BTreeMap<PolicyScope, usize> {
        let state = self.state.read();
        PolicyScope::CHAIN
            .iter()
            .map(|scope| {
                let count = state.scope_index.get(scope).map_or(0, BTreeMap::len);
                (*scope, count)
            })
            .collect()
    }

    /// Total rules across all policies, default rules included
    pub fn rule_count(&self) -> usize {
        self.state
            .read()
            .policies
            .values()
            .map(|s| s.policy.rule_count())
            .sum()
    }

    pub fn len(&self) -> usize {
        self.state.read().policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Caller must hold the write lock
    fn invalidate(&self, scopes: &[(PolicyScope, Option<&str>)]) {
        match self.invalidation {
            CacheInvalidation::Full => self.cache.clear(),
            CacheInvalidation::Scope => {
                let dropped: usize = scopes
                    .iter()
                    .map(|(scope, scope_id)| self.cache.invalidate_scope(*scope, *scope_id))
                    .sum();
                tracing::debug!(dropped, "Scoped cache invalidation");
            }
        }
    }
}

fn assign_rule_id(mut rule: AnonymizationRule) -> AnonymizationRule {
    if rule.id.trim().is_empty() {
        rule.id = Uuid::new_v4().to_string();
    }
    rule
}

fn apply_update(policy: &mut AnonymizationPolicy, update: PolicyUpdate) {
    if let Some(name) = update.name {
        policy.name = name;
    }
    if let Some(scope) = update.scope {
        policy.scope = scope;
    }
    if let Some(scope_id) = update.scope_id {
        policy.scope_id = scope_id;
    }
    if let Some(enabled) = update.enabled {
        policy.enabled = enabled;
    }
    if let Some(priority) = update.priority {
        policy.priority = priority;
    }
    if let Some(rules) = update.rules {
        policy.rules = rules.into_iter().map(assign_rule_id).collect();
    }
    if let Some(default_rule) = update.default_rule {
        policy.default_rule = default_rule.map(assign_rule_id);
    }
    if let Some(classifications) = update.data_classifications {
        policy.data_classifications = classifications;
    }
    if let Some(effective_date) = update.effective_date {
        policy.effective_date = Some(effective_date);
    }
    if let Some(expiration_date) = update.expiration_date {
        policy.expiration_date = expiration_date;
    }
}

/// Structural checks run on create and update
pub fn validate_policy(policy: &AnonymizationPolicy) -> Result<()> {
    let invalid = |msg: String| Err(MasqueradeError::PolicyValidation(msg));

    if policy.name.trim().is_empty() {
        return invalid("policy name must not be empty".to_string());
    }
    if policy.rules.is_empty() {
        return invalid(format!("policy '{}' must have at least one rule", policy.name));
    }
    if policy.scope != PolicyScope::Global
        && policy.scope_id.as_deref().map_or(true, |s| s.trim().is_empty())
    {
        return invalid(format!(
            "policy '{}' has scope {} but no scope_id",
            policy.name, policy.scope
        ));
    }
    if let Some(expiration) = policy.expiration_date {
        if policy.effective_date.is_some_and(|effective| expiration <= effective) {
            return invalid(format!(
                "policy '{}' expires before it becomes effective",
                policy.name
            ));
        }
    }

    let mut seen = HashSet::new();
    for (index, rule) in policy.rules.iter().chain(policy.default_rule.iter()).enumerate() {
        if rule.name.trim().is_empty() {
            return invalid(format!("rule #{index} of policy '{}' has no name", policy.name));
        }
        if rule.field.trim().is_empty() {
            return invalid(format!("rule '{}' has no field", rule.name));
        }
        if !seen.insert(rule.id.as_str()) {
            return invalid(format!("duplicate rule id '{}'", rule.id));
        }
    }

    Ok(())
}
