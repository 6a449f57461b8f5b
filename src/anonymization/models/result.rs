//! Evaluation and anonymization result models

use super::policy::{AnonymizationPolicy, AnonymizationRule, AnonymizationTechnique, PolicyVersion, Strength};
use super::rule_config::RuleConfig;
use crate::anonymization::format::PhoneNumberFormat;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Outcome of policy resolution for one context
///
/// Ephemeral and cacheable; `reasoning` holds one line per policy considered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyEvaluationResult {
    pub policy: AnonymizationPolicy,
    pub rule: AnonymizationRule,
    pub should_anonymize: bool,
    pub technique: AnonymizationTechnique,
    pub strength: Strength,
    pub reversible: bool,
    pub config: RuleConfig,
    pub reasoning: Vec<String>,
    /// Score relative to the best score the rule could reach (0.0 - 1.0)
    pub confidence: f64,
    /// Raw resolver score of the winning rule
    pub score: f64,
}

/// Per-result metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnonymizationMetadata {
    /// Parsed structure of the input value
    pub format: Option<PhoneNumberFormat>,
    pub policy_id: Option<String>,
    pub policy_version: Option<PolicyVersion>,
    pub rule_id: Option<String>,
    pub strength: Option<Strength>,
    pub processing_time_ms: u64,
    pub timestamp: Option<DateTime<Utc>>,
    /// Error captured for a degraded batch item
    pub error: Option<String>,
    /// Technique-specific details (key id, token format, cache hits...)
    #[serde(default)]
    pub details: BTreeMap<String, Value>,
}

/// Result of anonymizing one value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonymizationResult {
    pub original: String,
    pub anonymized: String,
    pub technique: AnonymizationTechnique,
    pub reversible: bool,
    /// Reversal handle, present only when the result is reversible
    pub token: Option<String>,
    pub quality_score: f64,
    pub metadata: AnonymizationMetadata,
}

impl AnonymizationResult {
    /// Degraded result for an item that failed inside a batch
    ///
    /// Never carries any transformed or partially transformed value.
    pub fn failed(original: impl Into<String>, technique: AnonymizationTechnique, error: impl ToString) -> Self {
        Self {
            original: original.into(),
            anonymized: String::new(),
            technique,
            reversible: false,
            token: None,
            quality_score: 0.0,
            metadata: AnonymizationMetadata {
                error: Some(error.to_string()),
                timestamp: Some(Utc::now()),
                ..AnonymizationMetadata::default()
            },
        }
    }

    /// Whether this result is a degraded failure
    pub fn is_failure(&self) -> bool {
        self.metadata.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_is_degraded() {
        let result = AnonymizationResult::failed("", AnonymizationTechnique::Masking, "Value is empty");
        assert!(result.is_failure());
        assert!(!result.reversible);
        assert_eq!(result.quality_score, 0.0);
        assert!(result.token.is_none());
        assert_eq!(result.metadata.error.as_deref(), Some("Value is empty"));
    }
}
