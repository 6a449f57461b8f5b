//! Suppression anonymization strategy

use super::{Anonymizer, TechniqueInput, TechniqueOutput};
use crate::anonymization::models::AnonymizationTechnique;
use crate::anonymization::quality::QualityScorer;
use crate::domain::errors::TechniqueError;
use async_trait::async_trait;

/// Suppression strategy - replaces the whole value with a label
#[derive(Debug, Clone, Copy, Default)]
pub struct SuppressionAnonymizer {
    scorer: QualityScorer,
}

impl SuppressionAnonymizer {
    pub fn new(scorer: QualityScorer) -> Self {
        Self { scorer }
    }
}

#[async_trait]
impl Anonymizer for SuppressionAnonymizer {
    fn technique(&self) -> AnonymizationTechnique {
        AnonymizationTechnique::Suppression
    }

    async fn apply(&self, input: &TechniqueInput<'_>) -> Result<TechniqueOutput, TechniqueError> {
        Ok(TechniqueOutput {
            anonymized: input.config.suppression.label.clone(),
            quality_score: self.scorer.suppressed(),
            ..TechniqueOutput::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymization::format::PhoneParser;
    use crate::anonymization::models::{RuleConfig, SuppressionConfig};

    #[tokio::test]
    async fn test_suppression_label() {
        let format = PhoneParser::new().parse("+1-415-555-0100");
        let mut config = RuleConfig::default();

        let output = SuppressionAnonymizer::default()
            .apply(&TechniqueInput {
                value: "+1-415-555-0100",
                format: &format,
                config: &config,
                reversible: true,
            })
            .await
            .unwrap();
        assert_eq!(output.anonymized, "[REDACTED]");
        assert!(!output.reversible);
        assert_eq!(output.quality_score, 0.0);

        config.suppression = SuppressionConfig {
            label: "[PHONE]".to_string(),
        };
        let output = SuppressionAnonymizer::default()
            .apply(&TechniqueInput {
                value: "+1-415-555-0100",
                format: &format,
                config: &config,
                reversible: false,
            })
            .await
            .unwrap();
        assert_eq!(output.anonymized, "[PHONE]");
    }
}
