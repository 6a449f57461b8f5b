//! Policy resolution
//!
//! Walks the scope chain `global -> organization -> team -> user`, keeps
//! the applicable policies, scores every enabled rule and returns the single
//! best `(policy, rule)` pair across all of them.
//!
//! Ties on score are broken by policy priority, then rule priority (both
//! higher wins), then policy insertion order, then rule declaration order
//! (both earlier wins).

use super::conditions::{ConditionEvaluator, PredicateRegistry};
use super::store::{PolicyStore, StoreState, StoredPolicy};
use crate::anonymization::models::{
    AnonymizationPolicy, AnonymizationRule, ConditionType, EvaluationContext,
    PolicyEvaluationResult, PolicyScope,
};
use crate::domain::{MasqueradeError, Result};
use std::cmp::Ordering;
use std::sync::Arc;

/// Base score when the rule field equals the context field
pub const FIELD_EXACT_SCORE: f64 = 10.0;
/// Base score for a wildcard (`*` / `any`) rule field
pub const FIELD_WILDCARD_SCORE: f64 = 5.0;
/// Added per PII type shared by the rule and the context
pub const PII_TYPE_BONUS: f64 = 5.0;
/// Contribution of a satisfied condition
pub const CONDITION_MATCH_WEIGHT: f64 = 10.0;
/// Penalty of a failed condition
pub const CONDITION_MISS_PENALTY: f64 = 20.0;
/// Score given to a default rule that does not score positively itself
pub const DEFAULT_RULE_FLOOR: f64 = 1.0;

const SCORE_EPSILON: f64 = 1e-9;

struct Candidate<'a> {
    policy: &'a AnonymizationPolicy,
    rule: &'a AnonymizationRule,
    sequence: u64,
    rule_index: usize,
    score: f64,
}

impl Candidate<'_> {
    /// `Greater` when `self` should win over `other`
    fn rank(&self, other: &Self) -> Ordering {
        let by_score = if (self.score - other.score).abs() <= SCORE_EPSILON {
            Ordering::Equal
        } else if self.score > other.score {
            Ordering::Greater
        } else {
            Ordering::Less
        };

        by_score
            .then(self.policy.priority.cmp(&other.policy.priority))
            .then(self.rule.priority.cmp(&other.rule.priority))
            .then(other.sequence.cmp(&self.sequence))
            .then(other.rule_index.cmp(&self.rule_index))
    }
}

/// Resolves the effective anonymization rule for a context
pub struct PolicyResolver {
    store: Arc<PolicyStore>,
    conditions: ConditionEvaluator,
}

impl PolicyResolver {
    pub fn new(store: Arc<PolicyStore>, predicates: PredicateRegistry) -> Self {
        Self {
            store,
            conditions: ConditionEvaluator::new(predicates),
        }
    }

    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    /// Resolve `ctx`, serving repeated contexts from the evaluation cache
    ///
    /// Results are only cached when no in-scope policy has a bounded
    /// applicability window or a `time`/`custom` condition, since those
    /// read inputs the cache key does not cover.
    ///
    /// # Errors
    ///
    /// `PolicyNotFound` when no policy applies, `RuleNotMatched` when
    /// applicable policies exist but no rule scores above zero.
    pub fn evaluate(&self, ctx: &EvaluationContext) -> Result<PolicyEvaluationResult> {
        // Held across lookup and insert so a concurrent mutation cannot
        // slip between computing a result and caching it.
        let state = self.store.read();
        let cache = self.store.cache();

        if let Some(hit) = cache.get(ctx) {
            tracing::debug!(
                policy_id = %hit.policy.id,
                rule_id = %hit.rule.id,
                "Evaluation served from cache"
            );
            return Ok(hit);
        }

        let result = self.resolve(&state, ctx)?;
        if is_cacheable(&state, ctx) {
            cache.insert(ctx, result.clone());
        }
        Ok(result)
    }

    /// Resolve without consulting or populating the cache
    pub fn evaluate_uncached(&self, ctx: &EvaluationContext) -> Result<PolicyEvaluationResult> {
        let state = self.store.read();
        self.resolve(&state, ctx)
    }

    /// Score of `rule` for `ctx`; zero or less means the rule does not match
    pub fn score_rule(&self, rule: &AnonymizationRule, ctx: &EvaluationContext) -> f64 {
        let base = if rule.field.trim().eq_ignore_ascii_case(ctx.field.trim()) {
            FIELD_EXACT_SCORE
        } else if rule.is_wildcard() {
            FIELD_WILDCARD_SCORE
        } else {
            return 0.0;
        };

        let overlap = rule
            .pii_types
            .iter()
            .filter(|p| ctx.pii_types.iter().any(|c| c.eq_ignore_ascii_case(p)))
            .count();
        let mut score = base + PII_TYPE_BONUS * overlap as f64;

        if !rule.conditions.is_empty() {
            let total: f64 = rule
                .conditions
                .iter()
                .map(|condition| {
                    if self.conditions.evaluate(condition, ctx) {
                        CONDITION_MATCH_WEIGHT
                    } else {
                        -CONDITION_MISS_PENALTY
                    }
                })
                .sum();
            score += total / rule.conditions.len() as f64;
        }

        score
    }

    fn resolve(&self, state: &StoreState, ctx: &EvaluationContext) -> Result<PolicyEvaluationResult> {
        let mut reasoning = Vec::new();
        let mut applicable: Vec<&StoredPolicy> = Vec::new();

        for scope in PolicyScope::CHAIN {
            for stored in state.in_scope(scope) {
                let policy = &stored.policy;
                if !scope_matches(policy, ctx) {
                    continue;
                }
                match policy.inapplicable_reason(ctx.timestamp, ctx.data_classification.as_deref()) {
                    Some(reason) => reasoning.push(format!(
                        "{}: skipped ({reason})",
                        describe(policy)
                    )),
                    None => applicable.push(stored),
                }
            }
        }

        if applicable.is_empty() {
            tracing::debug!(user_id = %ctx.user_id, field = %ctx.field, "No applicable policy");
            return Err(MasqueradeError::PolicyNotFound(format!(
                "no applicable policy for field '{}' (user '{}')",
                ctx.field, ctx.user_id
            )));
        }

        // Stable: equal priorities keep scope-chain then insertion order
        applicable.sort_by(|a, b| b.policy.priority.cmp(&a.policy.priority));

        let mut best: Option<Candidate<'_>> = None;
        for stored in applicable {
            let candidate = self.best_in_policy(stored, ctx, &mut reasoning);
            if let Some(candidate) = candidate {
                let replace = best
                    .as_ref()
                    .map_or(true, |current| candidate.rank(current) == Ordering::Greater);
                if replace {
                    best = Some(candidate);
                }
            }
        }

        let Some(best) = best else {
            return Err(MasqueradeError::RuleNotMatched(format!(
                "applicable policies exist but no rule matched field '{}'",
                ctx.field
            )));
        };

        reasoning.push(format!(
            "selected rule '{}' from policy '{}' (score {:.2})",
            best.rule.name, best.policy.name, best.score
        ));

        let confidence = (best.score / max_score(best.rule, ctx)).clamp(0.0, 1.0);

        tracing::debug!(
            policy_id = %best.policy.id,
            rule_id = %best.rule.id,
            score = best.score,
            "Policy resolved"
        );

        Ok(PolicyEvaluationResult {
            policy: best.policy.clone(),
            rule: best.rule.clone(),
            should_anonymize: true,
            technique: best.rule.technique,
            strength: best.rule.strength,
            reversible: best.rule.reversible,
            config: best.rule.config.clone(),
            reasoning,
            confidence,
            score: best.score,
        })
    }

    fn best_in_policy<'a>(
        &self,
        stored: &'a StoredPolicy,
        ctx: &EvaluationContext,
        reasoning: &mut Vec<String>,
    ) -> Option<Candidate<'a>> {
        let policy = &stored.policy;

        let mut rules: Vec<(usize, &AnonymizationRule)> = policy
            .rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.enabled)
            .collect();
        rules.sort_by(|a, b| b.1.priority.cmp(&a.1.priority));

        let mut best: Option<Candidate<'a>> = None;
        for (rule_index, rule) in rules {
            let score = self.score_rule(rule, ctx);
            if score <= 0.0 {
                continue;
            }
            let candidate = Candidate {
                policy,
                rule,
                sequence: stored.sequence,
                rule_index,
                score,
            };
            let replace = best
                .as_ref()
                .map_or(true, |current| candidate.rank(current) == Ordering::Greater);
            if replace {
                best = Some(candidate);
            }
        }

        if let Some(found) = &best {
            reasoning.push(format!(
                "{}: rule '{}' scored {:.2}",
                describe(policy),
                found.rule.name,
                found.score
            ));
            return best;
        }

        match policy.default_rule.as_ref().filter(|rule| rule.enabled) {
            Some(rule) => {
                let computed = self.score_rule(rule, ctx);
                let score = if computed > 0.0 { computed } else { DEFAULT_RULE_FLOOR };
                reasoning.push(format!(
                    "{}: no rule matched, default rule '{}' ({:.2})",
                    describe(policy),
                    rule.name,
                    score
                ));
                Some(Candidate {
                    policy,
                    rule,
                    sequence: stored.sequence,
                    rule_index: policy.rules.len(),
                    score,
                })
            }
            None => {
                reasoning.push(format!("{}: no rule matched", describe(policy)));
                None
            }
        }
    }
}

fn scope_matches(policy: &AnonymizationPolicy, ctx: &EvaluationContext) -> bool {
    let scope_id = policy.scope_id.as_deref();
    match policy.scope {
        PolicyScope::Global => true,
        PolicyScope::Organization => scope_id.is_some() && ctx.organization_id.as_deref() == scope_id,
        PolicyScope::Team => scope_id.is_some() && ctx.team_id.as_deref() == scope_id,
        PolicyScope::User => scope_id == Some(ctx.user_id.as_str()),
    }
}

/// Whether resolving `ctx` depends only on the cache key
fn is_cacheable(state: &StoreState, ctx: &EvaluationContext) -> bool {
    PolicyScope::CHAIN.into_iter().all(|scope| {
        state
            .in_scope(scope)
            .filter(|stored| scope_matches(&stored.policy, ctx))
            .all(|stored| !is_time_dependent(&stored.policy))
    })
}

fn is_time_dependent(policy: &AnonymizationPolicy) -> bool {
    policy.effective_date.is_some()
        || policy.expiration_date.is_some()
        || policy
            .rules
            .iter()
            .chain(policy.default_rule.iter())
            .flat_map(|rule| &rule.conditions)
            .any(|condition| {
                matches!(
                    condition.condition_type,
                    ConditionType::Time | ConditionType::Custom
                )
            })
}

/// Best score `rule` could reach for `ctx`
fn max_score(rule: &AnonymizationRule, ctx: &EvaluationContext) -> f64 {
    let mut max = FIELD_EXACT_SCORE + PII_TYPE_BONUS * ctx.pii_types.len() as f64;
    if !rule.conditions.is_empty() {
        max += CONDITION_MATCH_WEIGHT;
    }
    max
}

fn describe(policy: &AnonymizationPolicy) -> String {
    match &policy.scope_id {
        Some(scope_id) => format!(
            "policy '{}' v{} [{}:{}, priority {}]",
            policy.name, policy.version, policy.scope, scope_id, policy.priority
        ),
        None => format!(
            "policy '{}' v{} [{}, priority {}]",
            policy.name, policy.version, policy.scope, policy.priority
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymization::config::CacheInvalidation;
    use crate::anonymization::models::{
        AnonymizationCondition, AnonymizationTechnique, ConditionPredicate, PolicyDraft,
    };
    use crate::anonymization::policy::EvaluationCache;
    use serde_json::json;

    fn resolver() -> PolicyResolver {
        let store = Arc::new(PolicyStore::new(
            Arc::new(EvaluationCache::default()),
            CacheInvalidation::Full,
        ));
        PolicyResolver::new(store, PredicateRegistry::new())
    }

    fn rule(name: &str, field: &str) -> AnonymizationRule {
        AnonymizationRule::new(name, field, AnonymizationTechnique::Masking).with_id(name)
    }

    fn ctx() -> EvaluationContext {
        EvaluationContext::builder("u1", "analyst", "phone")
            .organization("org-1")
            .pii_type("phone")
            .build()
    }

    #[test]
    fn test_rule_scoring() {
        let resolver = resolver();
        let ctx = ctx();

        assert_eq!(resolver.score_rule(&rule("a", "phone"), &ctx), 10.0);
        assert_eq!(resolver.score_rule(&rule("a", "*"), &ctx), 5.0);
        assert_eq!(resolver.score_rule(&rule("a", "email"), &ctx), 0.0);
        assert_eq!(
            resolver.score_rule(&rule("a", "phone").with_pii_types(["PHONE", "email"]), &ctx),
            15.0
        );

        let failing = rule("a", "phone").with_condition(AnonymizationCondition::new(
            ConditionType::Role,
            ConditionPredicate::Equals(json!("admin")),
        ));
        assert_eq!(resolver.score_rule(&failing, &ctx), -10.0);

        let mixed = rule("a", "phone")
            .with_condition(AnonymizationCondition::new(
                ConditionType::Role,
                ConditionPredicate::Equals(json!("analyst")),
            ))
            .with_condition(AnonymizationCondition::new(
                ConditionType::Role,
                ConditionPredicate::Equals(json!("admin")),
            ));
        // (10 - 20) / 2
        assert_eq!(resolver.score_rule(&mixed, &ctx), 5.0);
    }

    #[test]
    fn test_no_policy_and_no_rule() {
        let resolver = resolver();
        let err = resolver.evaluate(&ctx()).unwrap_err();
        assert!(matches!(err, MasqueradeError::PolicyNotFound(_)));

        resolver
            .store()
            .create(PolicyDraft::new("emails").with_rule(rule("e", "email")), "admin")
            .unwrap();
        let err = resolver.evaluate(&ctx()).unwrap_err();
        assert!(matches!(err, MasqueradeError::RuleNotMatched(_)));
    }

    #[test]
    fn test_default_rule_floor() {
        let resolver = resolver();
        resolver
            .store()
            .create(
                PolicyDraft::new("fallback")
                    .with_rule(rule("e", "email"))
                    .with_default_rule(rule("d", "email")),
                "admin",
            )
            .unwrap();
        let result = resolver.evaluate(&ctx()).unwrap();
        assert_eq!(result.rule.id, "d");
        assert_eq!(result.score, DEFAULT_RULE_FLOOR);
    }

    #[test]
    fn test_cross_policy_best_score_wins() {
        let resolver = resolver();
        resolver
            .store()
            .create(
                PolicyDraft::new("high priority wildcard")
                    .with_priority(100)
                    .with_rule(rule("wild", "*")),
                "admin",
            )
            .unwrap();
        resolver
            .store()
            .create(
                PolicyDraft::new("org exact")
                    .scoped(PolicyScope::Organization, "org-1")
                    .with_rule(rule("exact", "phone")),
                "admin",
            )
            .unwrap();

        let result = resolver.evaluate(&ctx()).unwrap();
        assert_eq!(result.rule.id, "exact");
        assert_eq!(result.policy.name, "org exact");
        assert!(result.reasoning.len() >= 3);
    }

    #[test]
    fn test_tie_break_by_policy_then_rule_priority() {
        let resolver = resolver();
        let store = resolver.store();
        store
            .create(PolicyDraft::new("first").with_rule(rule("a", "phone")), "admin")
            .unwrap();
        store
            .create(
                PolicyDraft::new("second")
                    .with_rule(rule("low", "phone"))
                    .with_rule(rule("high", "phone").with_priority(5)),
                "admin",
            )
            .unwrap();

        // Equal policy priorities: the higher rule priority wins
        assert_eq!(resolver.evaluate_uncached(&ctx()).unwrap().rule.id, "high");

        let first = store.list().into_iter().find(|p| p.name == "first").unwrap();
        store
            .update(
                &first.id,
                crate::anonymization::models::PolicyUpdate {
                    priority: Some(1),
                    ..Default::default()
                },
                "admin",
            )
            .unwrap();
        assert_eq!(resolver.evaluate_uncached(&ctx()).unwrap().rule.id, "a");
    }

    #[test]
    fn test_tie_break_by_insertion_order() {
        let resolver = resolver();
        for name in ["one", "two"] {
            resolver
                .store()
                .create(PolicyDraft::new(name).with_rule(rule(name, "phone")), "admin")
                .unwrap();
        }
        assert_eq!(resolver.evaluate_uncached(&ctx()).unwrap().rule.id, "one");
    }

    #[test]
    fn test_scope_filtering() {
        let resolver = resolver();
        resolver
            .store()
            .create(
                PolicyDraft::new("other org")
                    .scoped(PolicyScope::Organization, "org-2")
                    .with_rule(rule("r", "phone")),
                "admin",
            )
            .unwrap();
        let err = resolver.evaluate(&ctx()).unwrap_err();
        assert!(matches!(err, MasqueradeError::PolicyNotFound(_)));
    }

    #[test]
    fn test_confidence() {
        let resolver = resolver();
        resolver
            .store()
            .create(
                PolicyDraft::new("phones")
                    .with_rule(rule("r", "phone").with_pii_types(["phone"])),
                "admin",
            )
            .unwrap();
        let result = resolver.evaluate(&ctx()).unwrap();
        assert_eq!(result.score, 15.0);
        assert!((result.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cache_served_until_mutation() {
        let resolver = resolver();
        let store = resolver.store();
        let policy = store
            .create(PolicyDraft::new("phones").with_rule(rule("r", "phone")), "admin")
            .unwrap();

        let first = resolver.evaluate(&ctx()).unwrap();
        let second = resolver.evaluate(&ctx()).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.cache().hits(), 1);

        store
            .update(
                &policy.id,
                crate::anonymization::models::PolicyUpdate {
                    enabled: Some(false),
                    ..Default::default()
                },
                "admin",
            )
            .unwrap();
        assert!(resolver.evaluate(&ctx()).is_err());
    }

    #[test]
    fn test_time_dependent_results_not_cached() {
        let resolver = resolver();
        resolver
            .store()
            .create(
                PolicyDraft::new("phones")
                    .with_rule(rule("plain", "phone"))
                    .with_rule(rule("late", "phone").with_pii_types(["phone"]).with_condition(
                        AnonymizationCondition::new(
                            ConditionType::Time,
                            ConditionPredicate::Greater(json!(1_700_000_000)),
                        ),
                    )),
                "admin",
            )
            .unwrap();

        let now = chrono::Utc::now();
        let before = EvaluationContext {
            timestamp: now - chrono::Duration::days(5 * 365),
            ..ctx()
        };
        let after = EvaluationContext { timestamp: now, ..ctx() };

        assert_eq!(resolver.evaluate(&before).unwrap().rule.id, "plain");
        assert_eq!(resolver.evaluate(&after).unwrap().rule.id, "late");
        assert_eq!(resolver.evaluate(&before).unwrap().rule.id, "plain");
        assert!(resolver.store().cache().is_empty());
    }

    #[test]
    fn test_bounded_window_not_cached() {
        let resolver = resolver();
        let now = chrono::Utc::now();
        resolver
            .store()
            .create(
                PolicyDraft::new("campaign")
                    .with_rule(rule("r", "phone"))
                    .effective_between(now - chrono::Duration::days(1), None),
                "admin",
            )
            .unwrap();

        resolver.evaluate(&ctx()).unwrap();
        assert!(resolver.store().cache().is_empty());

        let early = EvaluationContext {
            timestamp: now - chrono::Duration::days(2),
            ..ctx()
        };
        assert!(matches!(
            resolver.evaluate(&early),
            Err(MasqueradeError::PolicyNotFound(_))
        ));
    }
}
