//! Masking behaviour through the engine, plus format-level properties

use masquerade::anonymization::anonymizer::MaskingAnonymizer;
use masquerade::anonymization::format::PhoneParser;
use masquerade::anonymization::models::{
    AnonymizationRule, AnonymizationTechnique, EvaluationContext, MaskingConfig, MaskingStyle,
    PolicyDraft, RuleConfig,
};
use masquerade::anonymization::vault::StaticKeyProvider;
use masquerade::anonymization::{AnonymizationEngine, EngineConfig};
use proptest::prelude::*;
use std::sync::Arc;

fn digits(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn mask(value: &str, config: &MaskingConfig) -> String {
    MaskingAnonymizer::default().mask(&PhoneParser::new().parse(value), config)
}

fn phone_like() -> impl Strategy<Value = String> {
    prop_oneof![
        "\\+1-[2-9][0-9]{2}-[2-9][0-9]{2}-[0-9]{4}",
        "\\([2-9][0-9]{2}\\) [2-9][0-9]{2}-[0-9]{4}",
        "\\+44 [0-9]{4} [0-9]{6}",
        "\\+[2-9][0-9]{1,2} [0-9]{3} [0-9]{3} [0-9]{3,4}",
        "[0-9]{7,12}",
    ]
}

#[tokio::test]
async fn test_smart_masking_through_engine() {
    let engine = AnonymizationEngine::new(EngineConfig::default(), Arc::new(StaticKeyProvider::new())).unwrap();
    let config = RuleConfig {
        masking: MaskingConfig {
            style: MaskingStyle::Smart,
            preserve_last_digits: 4,
            ..MaskingConfig::default()
        },
        ..RuleConfig::default()
    };
    engine
        .create_policy(
            PolicyDraft::new("phones").with_rule(
                AnonymizationRule::new("smart", "phone", AnonymizationTechnique::Masking)
                    .with_config(config),
            ),
            "admin",
        )
        .unwrap();

    let ctx = EvaluationContext::builder("u1", "analyst", "phone").build();
    let result = engine.anonymize("+1-415-555-0100", &ctx, None).await.unwrap();

    assert_eq!(result.anonymized, "+1-***-***-0100");
    assert_eq!(result.technique, AnonymizationTechnique::Masking);
    assert!(!result.reversible);
    assert!(result.token.is_none());
    assert!(result.quality_score > 0.0 && result.quality_score <= 1.0);
    let format = result.metadata.format.unwrap();
    assert!(format.is_valid);
    assert_eq!(format.country_code.as_deref(), Some("1"));
}

proptest! {
    #[test]
    fn prop_full_mask_leaves_no_digits(value in phone_like(), preserve_formatting in any::<bool>()) {
        let config = MaskingConfig {
            style: MaskingStyle::Full,
            preserve_formatting,
            ..MaskingConfig::default()
        };
        let masked = mask(&value, &config);
        prop_assert!(digits(&masked).is_empty(), "{} -> {}", value, masked);
    }

    #[test]
    fn prop_partial_mask_keeps_trailing_digits(value in phone_like(), keep in 0usize..=4) {
        let config = MaskingConfig {
            style: MaskingStyle::Partial,
            preserve_last_digits: keep,
            preserve_country_code: false,
            preserve_area_code: false,
            ..MaskingConfig::default()
        };
        let masked = mask(&value, &config);

        let original = digits(&value);
        let expected = &original[original.len() - keep..];
        prop_assert_eq!(digits(&masked), expected.to_string());
    }

    #[test]
    fn prop_masking_keeps_layout(value in phone_like()) {
        let masked = mask(&value, &MaskingConfig::default());
        prop_assert_eq!(masked.chars().count(), value.chars().count());
    }
}
