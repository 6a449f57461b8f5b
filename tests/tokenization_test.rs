//! Tokenization consistency and reversal through the engine

use masquerade::anonymization::models::{
    AnonymizationRule, AnonymizationTechnique, EvaluationContext, PolicyDraft, RuleConfig,
    TokenFormat, TokenizationConfig,
};
use masquerade::anonymization::vault::StaticKeyProvider;
use masquerade::anonymization::{AnonymizationEngine, EngineConfig};
use std::collections::HashSet;
use std::sync::Arc;
use test_case::test_case;

fn engine() -> AnonymizationEngine {
    AnonymizationEngine::new(EngineConfig::default(), Arc::new(StaticKeyProvider::new())).unwrap()
}

fn ctx() -> EvaluationContext {
    EvaluationContext::builder("u1", "support", "phone").build()
}

fn tokenizing_policy(engine: &AnonymizationEngine, format: TokenFormat, reversible: bool) {
    let config = RuleConfig {
        tokenization: TokenizationConfig {
            format,
            ..TokenizationConfig::default()
        },
        ..RuleConfig::default()
    };
    engine
        .create_policy(
            PolicyDraft::new("tokens").with_rule(
                AnonymizationRule::new("tokenize", "phone", AnonymizationTechnique::Tokenization)
                    .with_config(config)
                    .reversible(reversible),
            ),
            "admin",
        )
        .unwrap();
}

#[tokio::test]
async fn test_same_value_same_token() {
    let engine = engine();
    let tokenize = Some(AnonymizationTechnique::Tokenization);

    let first = engine.anonymize("+1-415-555-0100", &ctx(), tokenize).await.unwrap();
    let second = engine.anonymize("+1-415-555-0100", &ctx(), tokenize).await.unwrap();
    let other = engine.anonymize("+1-212-555-0199", &ctx(), tokenize).await.unwrap();

    assert_eq!(first.anonymized, second.anonymized);
    assert_ne!(first.anonymized, other.anonymized);
    assert_ne!(first.anonymized, "+1-415-555-0100");
    // Formatted tokens keep the punctuation and the written country code
    assert!(first.anonymized.starts_with("+1-"));
    assert_eq!(first.anonymized.len(), "+1-415-555-0100".len());
}

#[tokio::test]
async fn test_concurrent_first_use_mints_one_token() {
    let engine = Arc::new(engine());

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .anonymize("+44 20 7946 0958", &ctx(), Some(AnonymizationTechnique::Tokenization))
                    .await
                    .unwrap()
                    .anonymized
            })
        })
        .collect();

    let mut tokens = HashSet::new();
    for task in tasks {
        tokens.insert(task.await.unwrap());
    }
    assert_eq!(tokens.len(), 1);
    assert_eq!(engine.vault().stats().forward_entries, 1);
}

#[test_case(TokenFormat::Formatted ; "formatted")]
#[test_case(TokenFormat::Numeric ; "numeric")]
#[test_case(TokenFormat::Uuid ; "uuid")]
#[tokio::test]
async fn test_reversible_token_round_trip(format: TokenFormat) {
    let engine = engine();
    tokenizing_policy(&engine, format, true);

    let result = engine.anonymize("(415) 555-0100", &ctx(), None).await.unwrap();
    assert!(result.reversible);
    let token = result.token.clone().unwrap();
    assert_eq!(token, result.anonymized);

    let original = engine.decrypt(&token, "auditor").await.unwrap();
    assert_eq!(original.as_deref(), Some("(415) 555-0100"));
}

#[tokio::test]
async fn test_irreversible_token_does_not_decrypt() {
    let engine = engine();
    tokenizing_policy(&engine, TokenFormat::Formatted, false);

    let result = engine.anonymize("(415) 555-0100", &ctx(), None).await.unwrap();
    assert!(!result.reversible);
    assert!(result.token.is_none());

    assert_eq!(engine.decrypt(&result.anonymized, "auditor").await.unwrap(), None);
}

#[tokio::test]
async fn test_value_without_digits_gets_uuid_token() {
    let engine = engine();
    let result = engine
        .anonymize("unknown", &ctx(), Some(AnonymizationTechnique::Tokenization))
        .await
        .unwrap();

    assert!(uuid::Uuid::parse_str(&result.anonymized).is_ok());
    assert_eq!(result.metadata.details["token_format"], "uuid");
}
