//! Generalization anonymization strategy

use super::{rewrite_digits, Anonymizer, DigitLayout, TechniqueInput, TechniqueOutput};
use crate::anonymization::models::AnonymizationTechnique;
use crate::anonymization::quality::QualityScorer;
use crate::domain::errors::TechniqueError;
use async_trait::async_trait;

/// Generalization strategy - keeps the country and area code, hides the rest
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneralizationAnonymizer {
    scorer: QualityScorer,
}

impl GeneralizationAnonymizer {
    pub fn new(scorer: QualityScorer) -> Self {
        Self { scorer }
    }
}

#[async_trait]
impl Anonymizer for GeneralizationAnonymizer {
    fn technique(&self) -> AnonymizationTechnique {
        AnonymizationTechnique::Generalization
    }

    async fn apply(&self, input: &TechniqueInput<'_>) -> Result<TechniqueOutput, TechniqueError> {
        let config = &input.config.generalization;
        let format = input.format;

        let anonymized = if format.has_digits() {
            let layout = DigitLayout::of(format);
            rewrite_digits(&format.original, true, |index, digit| {
                let keep = layout.country.contains(&index)
                    || (config.keep_area_code && layout.area.contains(&index));
                if keep {
                    digit
                } else {
                    config.placeholder
                }
            })
        } else {
            format
                .original
                .chars()
                .map(|c| if c.is_alphanumeric() { config.placeholder } else { c })
                .collect()
        };

        Ok(TechniqueOutput {
            quality_score: self.scorer.positional(format, &anonymized),
            anonymized,
            ..TechniqueOutput::default()
        })
    }
}
