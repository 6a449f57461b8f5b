//! Format-preserving masking

use super::{rewrite_digits, Anonymizer, DigitLayout, TechniqueInput, TechniqueOutput};
use crate::anonymization::format::PhoneNumberFormat;
use crate::anonymization::models::{AnonymizationTechnique, MaskingConfig, MaskingStyle};
use crate::anonymization::quality::QualityScorer;
use crate::domain::errors::TechniqueError;
use async_trait::async_trait;
use serde_json::json;

/// Digits always kept by smart masking
const SMART_LAST_DIGITS: usize = 4;

/// Masking strategy - replaces digits with a mask character
#[derive(Debug, Clone, Copy, Default)]
pub struct MaskingAnonymizer {
    scorer: QualityScorer,
}

impl MaskingAnonymizer {
    pub fn new(scorer: QualityScorer) -> Self {
        Self { scorer }
    }

    /// Mask a parsed value according to `config`
    pub fn mask(&self, format: &PhoneNumberFormat, config: &MaskingConfig) -> String {
        if !format.has_digits() {
            return simple_mask(&format.original, config.mask_char, config.preserve_last_digits);
        }

        match config.style {
            MaskingStyle::Full => {
                rewrite_digits(&format.original, config.preserve_formatting, |_, _| config.mask_char)
            }
            MaskingStyle::Partial => partial_mask(format, config),
            MaskingStyle::Smart if format.is_nanp() => smart_mask(format, config),
            MaskingStyle::Smart => partial_mask(format, config),
        }
    }
}

#[async_trait]
impl Anonymizer for MaskingAnonymizer {
    fn technique(&self) -> AnonymizationTechnique {
        AnonymizationTechnique::Masking
    }

    async fn apply(&self, input: &TechniqueInput<'_>) -> Result<TechniqueOutput, TechniqueError> {
        let config = &input.config.masking;
        let anonymized = self.mask(input.format, config);
        let quality_score = self.scorer.positional(input.format, &anonymized);

        let mut output = TechniqueOutput {
            anonymized,
            quality_score,
            ..TechniqueOutput::default()
        };
        output.details.insert("masking_style".to_string(), json!(config.style));
        Ok(output)
    }
}

fn partial_mask(format: &PhoneNumberFormat, config: &MaskingConfig) -> String {
    let layout = DigitLayout::of(format);
    let keep_from = layout.total.saturating_sub(config.preserve_last_digits);

    rewrite_digits(&format.original, config.preserve_formatting, |index, digit| {
        let keep = index >= keep_from
            || (config.preserve_country_code && layout.country.contains(&index))
            || (config.preserve_area_code && layout.area.contains(&index));
        if keep {
            digit
        } else {
            config.mask_char
        }
    })
}

/// Canonical `+{cc}-***-***-{last4}` shape; area code and exchange are always masked
fn smart_mask(format: &PhoneNumberFormat, config: &MaskingConfig) -> String {
    let mask = |n: usize| config.mask_char.to_string().repeat(n);
    let country = if config.preserve_country_code {
        format.country_code.clone().unwrap_or_else(|| "1".to_string())
    } else {
        mask(1)
    };
    let number = format.number.as_deref().unwrap_or_default();
    let tail = &number[number.len().saturating_sub(SMART_LAST_DIGITS)..];

    let mut masked = format!("+{country}-{}-{}-{tail}", mask(3), mask(3));
    if let Some(extension) = &format.extension {
        masked.push_str(" ext ");
        masked.push_str(&mask(extension.len()));
    }
    masked
}

/// Length mask keeping only the trailing `keep` characters
fn simple_mask(value: &str, mask_char: char, keep: usize) -> String {
    let len = value.chars().count();
    let keep_from = len.saturating_sub(keep);
    value
        .chars()
        .enumerate()
        .map(|(i, c)| if i >= keep_from { c } else { mask_char })
        .collect()
}
