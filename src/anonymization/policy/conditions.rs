//! Rule condition evaluation
//!
//! Conditions are a closed set of operators over a context attribute. The
//! only extension point is `custom(predicate_id)`, which resolves through a
//! [`PredicateRegistry`] populated by the host application.

use crate::anonymization::models::{
    AnonymizationCondition, ConditionPredicate, ConditionType, EvaluationContext,
};
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Signature of a registered custom predicate
pub type CustomPredicate =
    Arc<dyn Fn(&EvaluationContext, &AnonymizationCondition) -> bool + Send + Sync>;

/// Named predicates available to `custom` conditions
#[derive(Clone, Default)]
pub struct PredicateRegistry {
    predicates: HashMap<String, CustomPredicate>,
}

impl PredicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a predicate under `id`
    pub fn register<F>(&mut self, id: impl Into<String>, predicate: F)
    where
        F: Fn(&EvaluationContext, &AnonymizationCondition) -> bool + Send + Sync + 'static,
    {
        self.predicates.insert(id.into(), Arc::new(predicate));
    }

    pub fn get(&self, id: &str) -> Option<&CustomPredicate> {
        self.predicates.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.predicates.contains_key(id)
    }
}

impl std::fmt::Debug for PredicateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&String> = self.predicates.keys().collect();
        ids.sort();
        f.debug_struct("PredicateRegistry").field("predicates", &ids).finish()
    }
}

/// Compiled `matches` patterns keyed by pattern string
///
/// Invalid patterns are cached as `None` so they are reported once.
#[derive(Debug, Default)]
pub struct PatternCache {
    patterns: Mutex<HashMap<String, Option<Regex>>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `pattern` matches `haystack`; invalid patterns never match
    pub fn is_match(&self, pattern: &str, haystack: &str) -> bool {
        let mut patterns = self.patterns.lock();
        let compiled = patterns.entry(pattern.to_string()).or_insert_with(|| {
            match Regex::new(pattern) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "Invalid condition pattern");
                    None
                }
            }
        });
        compiled.as_ref().is_some_and(|regex| regex.is_match(haystack))
    }

    pub fn len(&self) -> usize {
        self.patterns.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Evaluates rule conditions against an evaluation context
#[derive(Debug, Default)]
pub struct ConditionEvaluator {
    patterns: PatternCache,
    predicates: PredicateRegistry,
}

impl ConditionEvaluator {
    pub fn new(predicates: PredicateRegistry) -> Self {
        Self {
            patterns: PatternCache::new(),
            predicates,
        }
    }

    pub fn predicates(&self) -> &PredicateRegistry {
        &self.predicates
    }

    /// Evaluate a single condition
    pub fn evaluate(&self, condition: &AnonymizationCondition, ctx: &EvaluationContext) -> bool {
        if let ConditionPredicate::Custom(predicate_id) = &condition.predicate {
            return match self.predicates.get(predicate_id) {
                Some(predicate) => predicate(ctx, condition),
                None => {
                    tracing::debug!(predicate_id = %predicate_id, "Unknown custom predicate");
                    false
                }
            };
        }

        let actual = select(condition, ctx);
        let Some(actual) = actual else {
            return matches!(
                condition.predicate,
                ConditionPredicate::NotEquals(_) | ConditionPredicate::NotIn(_)
            );
        };

        match &condition.predicate {
            ConditionPredicate::Equals(expected) => values_equal(&actual, expected),
            ConditionPredicate::NotEquals(expected) => !values_equal(&actual, expected),
            ConditionPredicate::In(options) => options.iter().any(|o| values_equal(&actual, o)),
            ConditionPredicate::NotIn(options) => !options.iter().any(|o| values_equal(&actual, o)),
            ConditionPredicate::Greater(bound) => {
                compare(&actual, bound) == Some(std::cmp::Ordering::Greater)
            }
            ConditionPredicate::Less(bound) => {
                compare(&actual, bound) == Some(std::cmp::Ordering::Less)
            }
            ConditionPredicate::Matches(pattern) => {
                self.patterns.is_match(pattern, &stringify(&actual))
            }
            ConditionPredicate::Custom(_) => false,
        }
    }
}

/// Read the context attribute a condition refers to
fn select(condition: &AnonymizationCondition, ctx: &EvaluationContext) -> Option<Value> {
    match condition.condition_type {
        ConditionType::Role => Some(Value::String(ctx.role.clone())),
        ConditionType::Classification => ctx.data_classification.clone().map(Value::String),
        ConditionType::Location => ctx.location.clone().map(Value::String),
        ConditionType::Time => Some(Value::String(ctx.timestamp.to_rfc3339())),
        ConditionType::Context => match &condition.key {
            Some(key) => ctx.metadata.get(key).cloned(),
            None => ctx.purpose.clone().map(Value::String),
        },
        ConditionType::Custom => condition
            .key
            .as_ref()
            .and_then(|key| ctx.metadata.get(key).cloned()),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Numbers (or numeric strings) compare as f64, timestamps as instants,
/// everything else as strings
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => chrono::DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.timestamp()),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    if let (Some(a), Some(b)) = (as_number(actual), as_number(expected)) {
        return (a - b).abs() < f64::EPSILON;
    }
    stringify(actual).eq_ignore_ascii_case(&stringify(expected))
}

fn compare(actual: &Value, bound: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(a), Some(b)) = (as_number(actual), as_number(bound)) {
        return a.partial_cmp(&b);
    }
    // Time conditions select an RFC3339 string; the bound may be epoch seconds
    if let (Some(a), Some(b)) = (as_timestamp(actual), as_timestamp(bound)) {
        return Some(a.cmp(&b));
    }
    Some(stringify(actual).cmp(&stringify(bound)))
}
