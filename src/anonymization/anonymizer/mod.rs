//! Anonymization techniques
//!
//! Every technique implements [`Anonymizer`] and is dispatched by
//! [`TechniqueExecutor`], which parses the value once and assembles the
//! final [`AnonymizationResult`].

pub mod encryption;
pub mod generalization;
pub mod masking;
pub mod suppression;
pub mod tokenization;

pub use encryption::{EncryptionAnonymizer, FreshNonce};
pub use generalization::GeneralizationAnonymizer;
pub use masking::MaskingAnonymizer;
pub use suppression::SuppressionAnonymizer;
pub use tokenization::TokenizationAnonymizer;

use crate::anonymization::format::{PhoneNumberFormat, PhoneParser};
use crate::anonymization::models::{
    AnonymizationMetadata, AnonymizationResult, AnonymizationTechnique, RuleConfig,
};
use crate::anonymization::quality::QualityScorer;
use crate::anonymization::vault::{KeyProvider, TokenVault};
use crate::domain::errors::TechniqueError;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

/// Input handed to a technique
#[derive(Debug, Clone, Copy)]
pub struct TechniqueInput<'a> {
    pub value: &'a str,
    pub format: &'a PhoneNumberFormat,
    pub config: &'a RuleConfig,
    pub reversible: bool,
}

/// What a technique produced
#[derive(Debug, Clone, Default)]
pub struct TechniqueOutput {
    pub anonymized: String,
    /// Reversal handle; only set for reversible outputs
    pub token: Option<String>,
    pub reversible: bool,
    pub quality_score: f64,
    pub details: BTreeMap<String, Value>,
}

/// Trait for anonymization technique implementations
#[async_trait]
pub trait Anonymizer: Send + Sync {
    /// Technique implemented
    fn technique(&self) -> AnonymizationTechnique;

    /// Anonymize one parsed value
    async fn apply(&self, input: &TechniqueInput<'_>) -> Result<TechniqueOutput, TechniqueError>;
}

/// Dispatches to the registered technique for a rule
pub struct TechniqueExecutor {
    parser: PhoneParser,
    techniques: HashMap<AnonymizationTechnique, Arc<dyn Anonymizer>>,
}

impl TechniqueExecutor {
    /// Executor with every built-in technique registered
    pub fn new(vault: Arc<TokenVault>, keys: Arc<dyn KeyProvider>) -> Self {
        let scorer = QualityScorer::new();
        let mut executor = Self {
            parser: PhoneParser::new(),
            techniques: HashMap::new(),
        };
        executor.register(Arc::new(MaskingAnonymizer::new(scorer)));
        executor.register(Arc::new(TokenizationAnonymizer::new(Arc::clone(&vault), scorer)));
        executor.register(Arc::new(EncryptionAnonymizer::new(vault, keys, scorer)));
        executor.register(Arc::new(GeneralizationAnonymizer::new(scorer)));
        executor.register(Arc::new(SuppressionAnonymizer::new(scorer)));
        executor
    }

    /// Register (or replace) the implementation of a technique
    pub fn register(&mut self, anonymizer: Arc<dyn Anonymizer>) {
        self.techniques.insert(anonymizer.technique(), anonymizer);
    }

    pub fn supports(&self, technique: AnonymizationTechnique) -> bool {
        self.techniques.contains_key(&technique)
    }

    pub fn parser(&self) -> &PhoneParser {
        &self.parser
    }

    /// Apply `technique` to `value`
    ///
    /// # Errors
    ///
    /// `EmptyValue` for empty input, `UnsupportedTechnique`
    /// for techniques without an implementation, and any failure of the
    /// technique itself (key retrieval included).
    pub async fn apply(
        &self,
        value: &str,
        technique: AnonymizationTechnique,
        config: &RuleConfig,
        reversible: bool,
    ) -> Result<AnonymizationResult, TechniqueError> {
        if value.is_empty() {
            return Err(TechniqueError::EmptyValue);
        }

        let anonymizer = self
            .techniques
            .get(&technique)
            .ok_or_else(|| TechniqueError::UnsupportedTechnique(technique.to_string()))?;

        let started = Instant::now();
        let format = self.parser.parse(value);
        let output = anonymizer
            .apply(&TechniqueInput {
                value,
                format: &format,
                config,
                reversible,
            })
            .await?;

        tracing::debug!(
            technique = %technique,
            kind = ?format.kind,
            quality = output.quality_score,
            "Technique applied"
        );

        Ok(AnonymizationResult {
            original: value.to_string(),
            anonymized: output.anonymized,
            technique,
            reversible: output.reversible,
            token: output.token,
            quality_score: output.quality_score,
            metadata: AnonymizationMetadata {
                format: Some(format),
                processing_time_ms: started.elapsed().as_millis() as u64,
                timestamp: Some(Utc::now()),
                details: output.details,
                ..AnonymizationMetadata::default()
            },
        })
    }
}

/// Positions of the structural digit groups within the value's digit sequence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct DigitLayout {
    /// All ASCII digits in the value, extension included
    pub total: usize,
    /// International `00` prefix plus country code, when written in the value
    pub country: std::ops::Range<usize>,
    pub area: std::ops::Range<usize>,
    /// Trailing extension digits
    pub extension: std::ops::Range<usize>,
}

impl DigitLayout {
    pub(crate) fn of(format: &PhoneNumberFormat) -> Self {
        let total = format.digit_count();
        let ext_len = format.extension.as_ref().map_or(0, String::len).min(total);
        let main = total - ext_len;

        let prefix = if format.original.trim_start().starts_with("00") && main > 2 {
            2
        } else {
            0
        };

        let cc_len = format.country_code.as_ref().map_or(0, String::len);
        let cc_written = match format.kind {
            crate::anonymization::format::PhoneKind::Nanp => main - prefix == 11,
            _ => cc_len > 0,
        };
        let country_end = if cc_written { (prefix + cc_len).min(main) } else { 0 };

        let area_len = format.area_code.as_ref().map_or(0, String::len);
        let area_start = country_end.max(prefix);
        let area_end = (area_start + area_len).min(main);

        Self {
            total,
            country: 0..country_end,
            area: area_start..area_end,
            extension: main..total,
        }
    }
}

/// Rewrite every digit of `original`; `replace(index, digit)` gives the new character
///
/// With `preserve_formatting == false` only the rewritten digits are kept.
pub(crate) fn rewrite_digits<F>(original: &str, preserve_formatting: bool, mut replace: F) -> String
where
    F: FnMut(usize, char) -> char,
{
    let mut index = 0;
    let mut out = String::with_capacity(original.len());
    for c in original.chars() {
        if c.is_ascii_digit() {
            out.push(replace(index, c));
            index += 1;
        } else if preserve_formatting {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymization::vault::{KeyMaterial, StaticKeyProvider};

    fn executor() -> TechniqueExecutor {
        let keys = StaticKeyProvider::new().with_key("default", KeyMaterial::generate());
        TechniqueExecutor::new(Arc::new(TokenVault::default()), Arc::new(keys))
    }

    #[test]
    fn test_digit_layout() {
        let parser = PhoneParser::new();

        let nanp = DigitLayout::of(&parser.parse("+1-415-555-0100 x12"));
        assert_eq!(nanp.total, 13);
        assert_eq!(nanp.country, 0..1);
        assert_eq!(nanp.area, 1..4);
        assert_eq!(nanp.extension, 11..13);

        let domestic = DigitLayout::of(&parser.parse("(415) 555-0100"));
        assert_eq!(domestic.country, 0..0);
        assert_eq!(domestic.area, 0..3);

        let uk = DigitLayout::of(&parser.parse("0044 2012 345678"));
        assert_eq!(uk.country, 0..4);
        assert_eq!(uk.area, 4..8);
    }

    #[test]
    fn test_rewrite_digits() {
        assert_eq!(rewrite_digits("+1-415", true, |_, _| '*'), "+*-***");
        assert_eq!(rewrite_digits("+1-415", false, |i, d| if i == 0 { d } else { '*' }), "1***");
    }

    #[tokio::test]
    async fn test_executor_rejects_empty_value() {
        let err = executor()
            .apply("", AnonymizationTechnique::Masking, &RuleConfig::default(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, TechniqueError::EmptyValue));
    }

    #[tokio::test]
    async fn test_executor_accepts_whitespace_value() {
        let result = executor()
            .apply("   ", AnonymizationTechnique::Suppression, &RuleConfig::default(), false)
            .await
            .unwrap();
        assert_eq!(result.original, "   ");
    }

    #[tokio::test]
    async fn test_executor_perturbation_unsupported() {
        let executor = executor();
        assert!(!executor.supports(AnonymizationTechnique::Perturbation));
        let err = executor
            .apply("+14155550100", AnonymizationTechnique::Perturbation, &RuleConfig::default(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, TechniqueError::UnsupportedTechnique(_)));
    }

    #[tokio::test]
    async fn test_executor_populates_format() {
        let result = executor()
            .apply("+1-415-555-0100", AnonymizationTechnique::Masking, &RuleConfig::default(), false)
            .await
            .unwrap();
        let format = result.metadata.format.unwrap();
        assert!(format.is_valid);
        assert_eq!(result.original, "+1-415-555-0100");
        assert!(result.metadata.timestamp.is_some());
    }
}
