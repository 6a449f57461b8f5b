//! Main anonymization engine
//!
//! This module provides the [`AnonymizationEngine`] facade that ties policy
//! management, resolution, technique execution, reversal and audit
//! reporting together.
//!
//! # Architecture
//!
//! The engine owns every stateful component; nothing is process-global:
//! - **PolicyStore**: versioned policies with cache invalidation on mutation
//! - **PolicyResolver**: scope-chain walk and rule scoring, memoized by the cache
//! - **TechniqueExecutor**: masking, tokenization, encryption and extensions
//! - **TokenVault / KeyProvider**: reversal state and key material
//! - **AuditSink**: optional collaborator, bounded and failure-tolerant
//!
//! # Examples
//!
//! ```no_run
//! use masquerade::anonymization::{AnonymizationEngine, EngineConfig};
//! use masquerade::anonymization::models::{
//!     AnonymizationRule, AnonymizationTechnique, EvaluationContext, PolicyDraft,
//! };
//! use masquerade::anonymization::vault::{KeyMaterial, StaticKeyProvider};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let keys = StaticKeyProvider::new().with_key("default", KeyMaterial::generate());
//! let engine = AnonymizationEngine::new(EngineConfig::default(), Arc::new(keys))?;
//!
//! engine.create_policy(
//!     PolicyDraft::new("phones").with_rule(AnonymizationRule::new(
//!         "mask phones",
//!         "phone",
//!         AnonymizationTechnique::Masking,
//!     )),
//!     "admin",
//! )?;
//!
//! let ctx = EvaluationContext::builder("user-1", "analyst", "phone").build();
//! let result = engine.anonymize("+1-415-555-0100", &ctx, None).await?;
//! println!("{}", result.anonymized);
//! # Ok(())
//! # }
//! ```

use crate::anonymization::{
    anonymizer::{encryption, TechniqueExecutor},
    audit::{hash_value, AuditCategory, AuditEvent, AuditOutcome, AuditSeverity, AuditSink, FileAuditLogger},
    config::{EngineConfig, FallbackBehavior},
    models::{
        AnonymizationPolicy, AnonymizationResult, AnonymizationTechnique, EvaluationContext,
        MaskingConfig, MaskingStyle, PolicyDraft, PolicyEvaluationResult, PolicyScope,
        PolicyUpdate, RuleConfig,
    },
    policy::{EvaluationCache, PolicyResolver, PolicyStore, PredicateRegistry},
    vault::{KeyProvider, StaticKeyProvider, TimeoutKeyProvider, TokenVault, VaultEntry, VaultStats},
};
use crate::config::MasqueradeConfig;
use crate::domain::{MasqueradeError, Result, TechniqueError};
use anyhow::Context;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Actor recorded for policies loaded from the configuration file
const CONFIG_ACTOR: &str = "config";

/// Engine counters and occupancy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatistics {
    pub policy_counts_by_scope: BTreeMap<PolicyScope, usize>,
    pub policy_count: usize,
    pub rule_count: usize,
    pub cache_size: usize,
    pub cache_hit_rate: f64,
    pub vault: VaultStats,
    pub evaluations: u64,
    pub anonymizations: u64,
    pub failed_anonymizations: u64,
}

#[derive(Debug, Default)]
struct Counters {
    evaluations: AtomicU64,
    anonymizations: AtomicU64,
    failures: AtomicU64,
}

/// Main anonymization engine
///
/// # Thread Safety
///
/// The engine is thread-safe and can be shared across async tasks using `Arc`.
/// Policy mutations and evaluations may run concurrently.
pub struct AnonymizationEngine {
    config: EngineConfig,
    store: Arc<PolicyStore>,
    resolver: PolicyResolver,
    executor: TechniqueExecutor,
    vault: Arc<TokenVault>,
    keys: Arc<dyn KeyProvider>,
    audit: Option<Arc<dyn AuditSink>>,
    counters: Counters,
}

impl AnonymizationEngine {
    /// Create a new engine
    ///
    /// `keys` is wrapped so every retrieval is bounded by
    /// `config.key_timeout_ms`. When `config.audit.enabled` is set, a
    /// [`FileAuditLogger`] is attached.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails or the audit log
    /// directory cannot be created.
    pub fn new(config: EngineConfig, keys: Arc<dyn KeyProvider>) -> anyhow::Result<Self> {
        config.validate().context("Invalid engine configuration")?;

        let cache = Arc::new(EvaluationCache::new(config.cache_ttl(), config.cache_capacity));
        let store = Arc::new(PolicyStore::new(cache, config.cache_invalidation));
        let resolver = PolicyResolver::new(Arc::clone(&store), PredicateRegistry::new());

        let vault = Arc::new(TokenVault::new(config.vault_capacity));
        let keys: Arc<dyn KeyProvider> = Arc::new(TimeoutKeyProvider::new(keys, config.key_timeout()));
        let executor = TechniqueExecutor::new(Arc::clone(&vault), Arc::clone(&keys));

        let audit: Option<Arc<dyn AuditSink>> = if config.audit.enabled {
            Some(Arc::new(FileAuditLogger::new(
                config.audit.log_path.clone(),
                config.audit.json_format,
            )?))
        } else {
            None
        };

        Ok(Self {
            config,
            store,
            resolver,
            executor,
            vault,
            keys,
            audit,
            counters: Counters::default(),
        })
    }

    /// Build an engine from a loaded configuration file, registering its keys and policies
    pub fn from_config(config: &MasqueradeConfig) -> anyhow::Result<Self> {
        let keys = StaticKeyProvider::from_config(&config.keys).context("Invalid key material")?;
        let engine = Self::new(config.engine.clone(), Arc::new(keys))?;

        for draft in &config.policies {
            engine
                .create_policy(draft.clone(), CONFIG_ACTOR)
                .with_context(|| format!("Failed to load policy '{}'", draft.name))?;
        }

        tracing::info!(
            policies = config.policies.len(),
            keys = config.keys.len(),
            "Engine initialized from configuration"
        );

        Ok(engine)
    }

    /// Replace the audit sink
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Install named predicates for `custom` conditions
    pub fn with_predicates(mut self, predicates: PredicateRegistry) -> Self {
        self.resolver = PolicyResolver::new(Arc::clone(&self.store), predicates);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn vault(&self) -> &Arc<TokenVault> {
        &self.vault
    }

    // --- policy management -------------------------------------------------

    /// Validate and store a new policy
    pub fn create_policy(&self, draft: PolicyDraft, created_by: &str) -> Result<AnonymizationPolicy> {
        self.store.create(draft, created_by)
    }

    /// Apply a partial update; the policy version is bumped
    pub fn update_policy(
        &self,
        id: &str,
        update: PolicyUpdate,
        updated_by: &str,
    ) -> Result<AnonymizationPolicy> {
        self.store.update(id, update, updated_by)
    }

    /// Remove a policy; returns whether it existed
    pub fn delete_policy(&self, id: &str) -> bool {
        self.store.delete(id)
    }

    pub fn get_policy(&self, id: &str) -> Option<AnonymizationPolicy> {
        self.store.get(id)
    }

    pub fn list_policies(&self) -> Vec<AnonymizationPolicy> {
        self.store.list()
    }

    // --- evaluation ----------------------------------------------------------

    /// Resolve the rule that applies to `ctx`
    ///
    /// # Errors
    ///
    /// `PolicyNotFound` or `RuleNotMatched`; callers choose the fallback.
    pub async fn evaluate(&self, ctx: &EvaluationContext) -> Result<PolicyEvaluationResult> {
        self.counters.evaluations.fetch_add(1, Ordering::Relaxed);
        let result = self.resolver.evaluate(ctx);

        let event = AuditEvent::new(&ctx.user_id, AuditCategory::PolicyEvaluation, "evaluate", &ctx.field);
        let event = match &result {
            Ok(evaluation) => event
                .with_metadata("policy_id", json!(evaluation.policy.id))
                .with_metadata("policy_version", json!(evaluation.policy.version))
                .with_metadata("rule_id", json!(evaluation.rule.id))
                .with_metadata("technique", json!(evaluation.technique))
                .with_metadata("confidence", json!(evaluation.confidence)),
            Err(e) => event
                .with_outcome(AuditOutcome::Failure)
                .with_severity(AuditSeverity::Warning)
                .with_metadata("error", json!(e.to_string())),
        };
        self.audit(event).await;

        result
    }

    // --- anonymization -------------------------------------------------------

    /// Anonymize one value for `ctx`
    ///
    /// With `technique`, the resolved rule's technique is overridden; if no
    /// policy resolves, the technique runs with default settings. Without
    /// it, resolution errors follow the configured fallback.
    ///
    /// The audit sink receives a single `Anonymization` event carrying the
    /// resolved policy and rule ids; the internal resolution is not reported
    /// as a separate `PolicyEvaluation` event. Whitespace is a value like any
    /// other; only the empty string is rejected.
    ///
    /// # Errors
    ///
    /// `Technique(EmptyValue)` for empty input, resolution errors under the
    /// `deny` fallback, and any technique failure (never swallowed).
    pub async fn anonymize(
        &self,
        value: &str,
        ctx: &EvaluationContext,
        technique: Option<AnonymizationTechnique>,
    ) -> Result<AnonymizationResult> {
        self.counters.anonymizations.fetch_add(1, Ordering::Relaxed);
        let result = self.anonymize_inner(value, ctx, technique).await;

        let event = AuditEvent::new(&ctx.user_id, AuditCategory::Anonymization, "anonymize", &ctx.field)
            .with_metadata("value_hash", json!(hash_value(value)));
        let event = match &result {
            Ok(anonymized) => event
                .with_metadata("technique", json!(anonymized.technique))
                .with_metadata("policy_id", json!(anonymized.metadata.policy_id))
                .with_metadata("rule_id", json!(anonymized.metadata.rule_id))
                .with_metadata("reversible", json!(anonymized.reversible))
                .with_metadata("quality_score", json!(anonymized.quality_score)),
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                event
                    .with_outcome(AuditOutcome::Failure)
                    .with_severity(AuditSeverity::Warning)
                    .with_metadata("error", json!(e.to_string()))
            }
        };
        self.audit(event).await;

        result
    }

    async fn anonymize_inner(
        &self,
        value: &str,
        ctx: &EvaluationContext,
        technique: Option<AnonymizationTechnique>,
    ) -> Result<AnonymizationResult> {
        if value.is_empty() {
            return Err(TechniqueError::EmptyValue.into());
        }

        let evaluation = match self.resolver.evaluate(ctx) {
            Ok(evaluation) => evaluation,
            Err(e) if e.is_resolution_error() => return self.unresolved(value, ctx, technique, e).await,
            Err(e) => return Err(e),
        };

        let chosen = technique.unwrap_or(evaluation.technique);
        let mut result = self
            .executor
            .apply(value, chosen, &evaluation.config, evaluation.reversible)
            .await?;

        result.metadata.policy_id = Some(evaluation.policy.id);
        result.metadata.policy_version = Some(evaluation.policy.version);
        result.metadata.rule_id = Some(evaluation.rule.id);
        result.metadata.strength = Some(evaluation.strength);

        Ok(result)
    }

    /// No rule resolved: honor an explicit technique, else the configured fallback
    async fn unresolved(
        &self,
        value: &str,
        ctx: &EvaluationContext,
        technique: Option<AnonymizationTechnique>,
        error: MasqueradeError,
    ) -> Result<AnonymizationResult> {
        if let Some(technique) = technique {
            tracing::debug!(field = %ctx.field, technique = %technique, "No policy resolved; using default settings");
            return Ok(self
                .executor
                .apply(value, technique, &RuleConfig::default(), false)
                .await?);
        }

        match self.config.fallback {
            FallbackBehavior::Deny => Err(error),
            FallbackBehavior::FullMask => {
                tracing::debug!(field = %ctx.field, reason = %error, "Falling back to full mask");
                let config = RuleConfig {
                    masking: MaskingConfig {
                        style: MaskingStyle::Full,
                        ..MaskingConfig::default()
                    },
                    ..RuleConfig::default()
                };
                let mut result = self
                    .executor
                    .apply(value, AnonymizationTechnique::Masking, &config, false)
                    .await?;
                result.metadata.details.insert("fallback".to_string(), json!(true));
                Ok(result)
            }
        }
    }

    /// Anonymize several values for the same context
    ///
    /// Items run concurrently and results keep input order. A failing item
    /// never aborts the batch: its result is degraded (empty output,
    /// `reversible = false`, quality 0, error in metadata).
    pub async fn anonymize_batch(
        &self,
        values: &[String],
        ctx: &EvaluationContext,
        technique: Option<AnonymizationTechnique>,
    ) -> Vec<AnonymizationResult> {
        let items = values.iter().enumerate().map(|(index, value)| async move {
            match self.anonymize(value, ctx, technique).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(index, error = %e, "Batch item failed");
                    AnonymizationResult::failed(value.as_str(), self.planned_technique(ctx, technique), e)
                }
            }
        });

        let started = Instant::now();
        let results = futures::future::join_all(items).await;
        let failed = results.iter().filter(|r| r.is_failure()).count();
        crate::log_batch_complete!(results.len(), failed, started.elapsed());
        results
    }

    /// Technique recorded on a failed batch item
    ///
    /// Resolved without the cache so failures do not skew its hit rate.
    fn planned_technique(
        &self,
        ctx: &EvaluationContext,
        technique: Option<AnonymizationTechnique>,
    ) -> AnonymizationTechnique {
        technique
            .or_else(|| self.resolver.evaluate_uncached(ctx).ok().map(|e| e.technique))
            .unwrap_or(AnonymizationTechnique::Masking)
    }

    // --- reversal ------------------------------------------------------------

    /// Recover the original value behind a reversible token
    ///
    /// Returns `Ok(None)` when the token is unknown, was not issued as
    /// reversible, or fails authentication.
    ///
    /// # Errors
    ///
    /// Key provider failures while decrypting a registered bundle.
    pub async fn decrypt(&self, token: &str, requestor: &str) -> Result<Option<String>> {
        let outcome = match self.vault.lookup(token) {
            Some(VaultEntry::Token {
                original,
                reversible: true,
            }) => Ok(Some(original)),
            Some(VaultEntry::Encrypted { key_id }) => self.open_bundle(token, &key_id).await,
            _ => Ok(None),
        };

        let event = AuditEvent::new(requestor, AuditCategory::Decryption, "decrypt", hash_value(token));
        let event = match &outcome {
            Ok(Some(_)) => event,
            Ok(None) => event.with_outcome(AuditOutcome::Failure),
            Err(e) => event
                .with_outcome(AuditOutcome::Failure)
                .with_severity(AuditSeverity::Critical)
                .with_metadata("error", json!(e.to_string())),
        };
        self.audit(event).await;

        outcome
    }

    async fn open_bundle(&self, bundle: &str, key_id: &str) -> Result<Option<String>> {
        let key = self
            .keys
            .get_key(key_id)
            .await
            .map_err(TechniqueError::from)?;

        match encryption::open(&key, key_id, bundle) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key_id = %key_id, error = %e, "Registered ciphertext failed to decrypt");
                Ok(None)
            }
        }
    }

    // --- statistics ----------------------------------------------------------

    pub fn statistics(&self) -> EngineStatistics {
        let cache = self.store.cache();
        EngineStatistics {
            policy_counts_by_scope: self.store.counts_by_scope(),
            policy_count: self.store.len(),
            rule_count: self.store.rule_count(),
            cache_size: cache.len(),
            cache_hit_rate: cache.hit_rate(),
            vault: self.vault.stats(),
            evaluations: self.counters.evaluations.load(Ordering::Relaxed),
            anonymizations: self.counters.anonymizations.load(Ordering::Relaxed),
            failed_anonymizations: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Hand an event to the sink; failures and timeouts are logged and dropped
    async fn audit(&self, event: AuditEvent) {
        let Some(sink) = &self.audit else {
            return;
        };

        let timeout = self.config.audit.timeout();
        match tokio::time::timeout(timeout, sink.log_event(event)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Audit sink failed; continuing"),
            Err(_) => tracing::warn!(
                timeout_ms = self.config.audit.timeout_ms,
                "Audit sink timed out; continuing"
            ),
        }
    }
}
